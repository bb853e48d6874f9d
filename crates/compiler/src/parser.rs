//! Recursive-descent parser producing the AST dialect.
//!
//! The grammar is the ChocoPy subset the backend supports: top-level
//! variable and function definitions followed by statements, structured
//! statements with indented blocks, and the usual Python expression
//! precedence (ternary over `or` over `and` over `not` over comparison
//! over additive over multiplicative over unary minus).

use crate::dialects::ast;
use crate::error::CompileError;
use crate::ir::{Attribute, Module, OpId};
use crate::lexer::{Token, TokKind, tokenize};

/// Parse a full source file into a module holding one `program` op.
pub fn parse_program(source: &str) -> Result<Module, CompileError> {
    let tokens = tokenize(source)?;
    let mut module = Module::new();
    let mut parser = Parser { tokens, pos: 0 };
    let program = parser.program(&mut module)?;
    let top = module.top_block();
    module.append_op(top, program);
    Ok(module)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &TokKind {
        &self.tokens[self.pos].kind
    }

    fn peek_at(&self, offset: usize) -> &TokKind {
        let index = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[index].kind
    }

    fn here(&self) -> (usize, usize) {
        let t = &self.tokens[self.pos];
        (t.line, t.column)
    }

    fn error(&self, message: impl Into<String>) -> CompileError {
        let (line, column) = self.here();
        CompileError::syntax(line, column, message)
    }

    fn advance(&mut self) -> TokKind {
        let kind = self.tokens[self.pos].kind.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    fn eat(&mut self, kind: &TokKind) -> bool {
        if self.peek() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokKind, what: &str) -> Result<(), CompileError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}, found {:?}", what, self.peek())))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, CompileError> {
        match self.peek().clone() {
            TokKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.error(format!("expected {}, found {:?}", what, other))),
        }
    }

    // program: (var_def | func_def)* stmt* EOF
    fn program(&mut self, m: &mut Module) -> Result<OpId, CompileError> {
        let mut defs = Vec::new();
        loop {
            if *self.peek() == TokKind::Def {
                defs.push(self.func_def(m)?);
            } else if self.at_var_def() {
                defs.push(self.var_def(m)?);
            } else {
                break;
            }
        }
        let mut stmts = Vec::new();
        while *self.peek() != TokKind::Eof {
            if *self.peek() == TokKind::Def {
                return Err(self.error("function definitions must precede statements"));
            }
            stmts.push(self.stmt(m)?);
        }
        Ok(ast::program(m, defs, stmts))
    }

    fn at_var_def(&self) -> bool {
        matches!(self.peek(), TokKind::Ident(_)) && *self.peek_at(1) == TokKind::Colon
    }

    // var_def: IDENT ':' type '=' literal NEWLINE
    fn var_def(&mut self, m: &mut Module) -> Result<OpId, CompileError> {
        let name = self.expect_ident("a variable name")?;
        self.expect(&TokKind::Colon, "':'")?;
        let ty = self.type_annotation(m)?;
        self.expect(&TokKind::Assign, "'='")?;
        let init = self.literal(m)?;
        self.expect(&TokKind::Newline, "end of line")?;
        let typed_var = ast::typed_var(m, &name, ty);
        Ok(ast::var_def(m, typed_var, init))
    }

    // type: IDENT | '[' type ']'
    fn type_annotation(&mut self, m: &mut Module) -> Result<OpId, CompileError> {
        if self.eat(&TokKind::LBracket) {
            let elem = self.type_annotation(m)?;
            self.expect(&TokKind::RBracket, "']'")?;
            return Ok(ast::list_type(m, elem));
        }
        let name = self.expect_ident("a type name")?;
        Ok(ast::type_name(m, &name))
    }

    // func_def: 'def' IDENT '(' params ')' ['->' type] ':' NEWLINE INDENT body DEDENT
    fn func_def(&mut self, m: &mut Module) -> Result<OpId, CompileError> {
        self.expect(&TokKind::Def, "'def'")?;
        let name = self.expect_ident("a function name")?;
        self.expect(&TokKind::LParen, "'('")?;
        let mut params = Vec::new();
        if *self.peek() != TokKind::RParen {
            loop {
                let param_name = self.expect_ident("a parameter name")?;
                self.expect(&TokKind::Colon, "':'")?;
                let ty = self.type_annotation(m)?;
                params.push(ast::typed_var(m, &param_name, ty));
                if !self.eat(&TokKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokKind::RParen, "')'")?;
        let return_type = if self.eat(&TokKind::Arrow) {
            self.type_annotation(m)?
        } else {
            ast::type_name(m, "<None>")
        };
        self.expect(&TokKind::Colon, "':'")?;
        self.expect(&TokKind::Newline, "end of line")?;
        self.expect(&TokKind::Indent, "an indented function body")?;

        let mut body = Vec::new();
        loop {
            match self.peek().clone() {
                TokKind::Global => {
                    self.advance();
                    let decl = self.expect_ident("a variable name")?;
                    self.expect(&TokKind::Newline, "end of line")?;
                    body.push(ast::global_decl(m, &decl));
                }
                TokKind::Nonlocal => {
                    self.advance();
                    let decl = self.expect_ident("a variable name")?;
                    self.expect(&TokKind::Newline, "end of line")?;
                    body.push(ast::nonlocal_decl(m, &decl));
                }
                _ if self.at_var_def() => body.push(self.var_def(m)?),
                _ => break,
            }
        }
        while *self.peek() != TokKind::Dedent {
            body.push(self.stmt(m)?);
        }
        self.expect(&TokKind::Dedent, "dedent")?;
        Ok(ast::func_def(m, &name, params, return_type, body))
    }

    // block: NEWLINE INDENT stmt+ DEDENT
    fn block(&mut self, m: &mut Module) -> Result<Vec<OpId>, CompileError> {
        self.expect(&TokKind::Newline, "end of line")?;
        self.expect(&TokKind::Indent, "an indented block")?;
        let mut stmts = Vec::new();
        while *self.peek() != TokKind::Dedent {
            stmts.push(self.stmt(m)?);
        }
        self.expect(&TokKind::Dedent, "dedent")?;
        if stmts.is_empty() {
            return Err(self.error("expected at least one statement in block"));
        }
        Ok(stmts)
    }

    fn stmt(&mut self, m: &mut Module) -> Result<OpId, CompileError> {
        match self.peek().clone() {
            TokKind::Pass => {
                self.advance();
                self.expect(&TokKind::Newline, "end of line")?;
                Ok(ast::pass_stmt(m))
            }
            TokKind::Return => {
                self.advance();
                let value = if *self.peek() == TokKind::Newline {
                    None
                } else {
                    Some(self.expr(m)?)
                };
                self.expect(&TokKind::Newline, "end of line")?;
                Ok(ast::return_stmt(m, value))
            }
            TokKind::If => self.if_stmt(m),
            TokKind::While => {
                self.advance();
                let cond = self.expr(m)?;
                self.expect(&TokKind::Colon, "':'")?;
                let body = self.block(m)?;
                Ok(ast::while_stmt(m, cond, body))
            }
            TokKind::For => {
                self.advance();
                let iter_name = self.expect_ident("a loop variable")?;
                self.expect(&TokKind::In, "'in'")?;
                let iterable = self.expr(m)?;
                self.expect(&TokKind::Colon, "':'")?;
                let body = self.block(m)?;
                Ok(ast::for_stmt(m, &iter_name, iterable, body))
            }
            _ => self.simple_stmt(m),
        }
    }

    fn if_stmt(&mut self, m: &mut Module) -> Result<OpId, CompileError> {
        self.advance(); // 'if' or 'elif'
        let cond = self.expr(m)?;
        self.expect(&TokKind::Colon, "':'")?;
        let then = self.block(m)?;
        let orelse = match self.peek() {
            TokKind::Elif => vec![self.if_stmt(m)?],
            TokKind::Else => {
                self.advance();
                self.expect(&TokKind::Colon, "':'")?;
                self.block(m)?
            }
            _ => Vec::new(),
        };
        Ok(ast::if_stmt(m, cond, then, orelse))
    }

    // simple_stmt: expr ('=' expr)* NEWLINE — a chain builds the
    // right-nested assign shape the lowering flattens back out.
    fn simple_stmt(&mut self, m: &mut Module) -> Result<OpId, CompileError> {
        let mut exprs = vec![self.expr(m)?];
        while self.eat(&TokKind::Assign) {
            exprs.push(self.expr(m)?);
        }
        self.expect(&TokKind::Newline, "end of line")?;
        let mut acc = exprs.pop().unwrap();
        while let Some(target) = exprs.pop() {
            acc = ast::assign(m, target, acc);
        }
        Ok(acc)
    }

    // expr: or_expr ['if' or_expr 'else' expr]
    fn expr(&mut self, m: &mut Module) -> Result<OpId, CompileError> {
        let value = self.or_expr(m)?;
        if self.eat(&TokKind::If) {
            let cond = self.or_expr(m)?;
            self.expect(&TokKind::Else, "'else'")?;
            let or_else = self.expr(m)?;
            return Ok(ast::if_expr(m, cond, value, or_else));
        }
        Ok(value)
    }

    fn or_expr(&mut self, m: &mut Module) -> Result<OpId, CompileError> {
        let mut lhs = self.and_expr(m)?;
        while self.eat(&TokKind::Or) {
            let rhs = self.and_expr(m)?;
            lhs = ast::binary_expr(m, "or", lhs, rhs);
        }
        Ok(lhs)
    }

    fn and_expr(&mut self, m: &mut Module) -> Result<OpId, CompileError> {
        let mut lhs = self.not_expr(m)?;
        while self.eat(&TokKind::And) {
            let rhs = self.not_expr(m)?;
            lhs = ast::binary_expr(m, "and", lhs, rhs);
        }
        Ok(lhs)
    }

    fn not_expr(&mut self, m: &mut Module) -> Result<OpId, CompileError> {
        if self.eat(&TokKind::Not) {
            let value = self.not_expr(m)?;
            return Ok(ast::unary_expr(m, "not", value));
        }
        self.comparison(m)
    }

    // A single, non-chaining comparison.
    fn comparison(&mut self, m: &mut Module) -> Result<OpId, CompileError> {
        let lhs = self.arith(m)?;
        let op = match self.peek() {
            TokKind::EqEq => "==",
            TokKind::NotEq => "!=",
            TokKind::Lt => "<",
            TokKind::Le => "<=",
            TokKind::Gt => ">",
            TokKind::Ge => ">=",
            TokKind::Is => "is",
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.arith(m)?;
        Ok(ast::binary_expr(m, op, lhs, rhs))
    }

    fn arith(&mut self, m: &mut Module) -> Result<OpId, CompileError> {
        let mut lhs = self.term(m)?;
        loop {
            let op = match self.peek() {
                TokKind::Plus => "+",
                TokKind::Minus => "-",
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.term(m)?;
            lhs = ast::binary_expr(m, op, lhs, rhs);
        }
    }

    fn term(&mut self, m: &mut Module) -> Result<OpId, CompileError> {
        let mut lhs = self.factor(m)?;
        loop {
            let op = match self.peek() {
                TokKind::Star => "*",
                TokKind::DoubleSlash => "//",
                TokKind::Percent => "%",
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.factor(m)?;
            lhs = ast::binary_expr(m, op, lhs, rhs);
        }
    }

    fn factor(&mut self, m: &mut Module) -> Result<OpId, CompileError> {
        if self.eat(&TokKind::Minus) {
            let value = self.factor(m)?;
            return Ok(ast::unary_expr(m, "-", value));
        }
        self.postfix(m)
    }

    // postfix: atom ('[' expr ']')*
    fn postfix(&mut self, m: &mut Module) -> Result<OpId, CompileError> {
        let mut value = self.atom(m)?;
        while self.eat(&TokKind::LBracket) {
            let index = self.expr(m)?;
            self.expect(&TokKind::RBracket, "']'")?;
            value = ast::index_expr(m, value, index);
        }
        Ok(value)
    }

    fn atom(&mut self, m: &mut Module) -> Result<OpId, CompileError> {
        match self.peek().clone() {
            TokKind::Int(_) | TokKind::Str(_) | TokKind::None | TokKind::True | TokKind::False => {
                self.literal(m)
            }
            TokKind::Ident(name) => {
                self.advance();
                if self.eat(&TokKind::LParen) {
                    let mut args = Vec::new();
                    if *self.peek() != TokKind::RParen {
                        loop {
                            args.push(self.expr(m)?);
                            if !self.eat(&TokKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(&TokKind::RParen, "')'")?;
                    return Ok(ast::call_expr(m, &name, args));
                }
                Ok(ast::expr_name(m, &name))
            }
            TokKind::LParen => {
                self.advance();
                let value = self.expr(m)?;
                self.expect(&TokKind::RParen, "')'")?;
                Ok(value)
            }
            TokKind::LBracket => {
                self.advance();
                let mut elems = Vec::new();
                if *self.peek() != TokKind::RBracket {
                    loop {
                        elems.push(self.expr(m)?);
                        if !self.eat(&TokKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokKind::RBracket, "']'")?;
                Ok(ast::list_expr(m, elems))
            }
            other => Err(self.error(format!("expected an expression, found {:?}", other))),
        }
    }

    fn literal(&mut self, m: &mut Module) -> Result<OpId, CompileError> {
        let negative = self.eat(&TokKind::Minus);
        match self.peek().clone() {
            TokKind::Int(v) => {
                self.advance();
                Ok(ast::literal(m, Attribute::Int(if negative { -v } else { v })))
            }
            _ if negative => Err(self.error("expected an integer literal after '-'")),
            TokKind::Str(s) => {
                self.advance();
                Ok(ast::literal(m, Attribute::Str(s)))
            }
            TokKind::True => {
                self.advance();
                Ok(ast::literal(m, Attribute::Bool(true)))
            }
            TokKind::False => {
                self.advance();
                Ok(ast::literal(m, Attribute::Bool(false)))
            }
            TokKind::None => {
                self.advance();
                Ok(ast::literal(m, Attribute::NoneLit))
            }
            other => Err(self.error(format!("expected a literal, found {:?}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialects::ast::{AstOp, ast_kind, region_only_op, region_ops};
    use crate::dialects::verify_module;

    fn parse(source: &str) -> (Module, OpId) {
        let m = parse_program(source).unwrap();
        let program = m.block_ops(m.top_block())[0];
        (m, program)
    }

    #[test]
    fn test_parse_print_call() {
        let (m, program) = parse("print(1 + 2)\n");
        verify_module(&m).unwrap();
        let stmts = region_ops(&m, program, 1);
        assert_eq!(stmts.len(), 1);
        assert_eq!(ast_kind(&m, stmts[0]), Some(AstOp::CallExpr));
        let arg = region_only_op(&m, stmts[0], 0);
        assert_eq!(ast_kind(&m, arg), Some(AstOp::BinaryExpr));
    }

    #[test]
    fn test_var_def_before_stmts() {
        let (m, program) = parse("x: int = 5\nprint(x)\n");
        let defs = region_ops(&m, program, 0);
        let stmts = region_ops(&m, program, 1);
        assert_eq!(defs.len(), 1);
        assert_eq!(ast_kind(&m, defs[0]), Some(AstOp::VarDef));
        assert_eq!(stmts.len(), 1);
        verify_module(&m).unwrap();
    }

    #[test]
    fn test_multi_assign_is_right_nested() {
        let (m, program) = parse("a = b = 0\n");
        let stmts = region_ops(&m, program, 1);
        let outer = stmts[0];
        assert_eq!(ast_kind(&m, outer), Some(AstOp::Assign));
        let inner = region_only_op(&m, outer, 1);
        assert_eq!(ast_kind(&m, inner), Some(AstOp::Assign));
        let value = region_only_op(&m, inner, 1);
        assert_eq!(ast_kind(&m, value), Some(AstOp::Literal));
    }

    #[test]
    fn test_func_def_with_params_and_return() {
        let (m, program) = parse("def add(a: int, b: int) -> int:\n    return a + b\nprint(add(1, 2))\n");
        verify_module(&m).unwrap();
        let defs = region_ops(&m, program, 0);
        assert_eq!(ast_kind(&m, defs[0]), Some(AstOp::FuncDef));
        let params = region_ops(&m, defs[0], 0);
        assert_eq!(params.len(), 2);
        let body = region_ops(&m, defs[0], 2);
        assert_eq!(ast_kind(&m, body[0]), Some(AstOp::Return));
    }

    #[test]
    fn test_elif_nests_in_orelse() {
        let (m, program) = parse("if True:\n    pass\nelif False:\n    pass\nelse:\n    pass\n");
        let stmts = region_ops(&m, program, 1);
        let if_op = stmts[0];
        let orelse = region_ops(&m, if_op, 2);
        assert_eq!(orelse.len(), 1);
        assert_eq!(ast_kind(&m, orelse[0]), Some(AstOp::If));
    }

    #[test]
    fn test_for_and_index() {
        let (m, program) = parse("xs: [int] = None\nfor x in xs:\n    print(xs[0])\n");
        verify_module(&m).unwrap();
        let stmts = region_ops(&m, program, 1);
        assert_eq!(ast_kind(&m, stmts[0]), Some(AstOp::For));
        assert_eq!(
            m.attr(stmts[0], "iter_name"),
            Some(Attribute::Str("x".to_string()))
        );
    }

    #[test]
    fn test_ternary_and_short_circuit() {
        let (m, program) = parse("x: bool = True\ny: int = 0\ny = 1 if x or False else 2\n");
        verify_module(&m).unwrap();
        let stmts = region_ops(&m, program, 1);
        let assign = stmts[0];
        let value = region_only_op(&m, assign, 1);
        assert_eq!(ast_kind(&m, value), Some(AstOp::IfExpr));
        let cond = region_only_op(&m, value, 0);
        assert_eq!(ast_kind(&m, cond), Some(AstOp::BinaryExpr));
        assert_eq!(m.attr(cond, "op"), Some(Attribute::Str("or".to_string())));
    }

    #[test]
    fn test_precedence_mul_over_add() {
        let (m, program) = parse("print(1 + 2 * 3)\n");
        let stmts = region_ops(&m, program, 1);
        let call = stmts[0];
        let add = region_only_op(&m, call, 0);
        assert_eq!(m.attr(add, "op"), Some(Attribute::Str("+".to_string())));
        let rhs = region_only_op(&m, add, 1);
        assert_eq!(m.attr(rhs, "op"), Some(Attribute::Str("*".to_string())));
    }

    #[test]
    fn test_syntax_error_position() {
        let err = parse_program("print(\n").unwrap_err();
        match err {
            CompileError::Syntax { line, .. } => assert_eq!(line, 1),
            other => panic!("expected a syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_negative_literal_in_var_def() {
        let (m, program) = parse("x: int = -3\nprint(x)\n");
        let defs = region_ops(&m, program, 0);
        let lit = region_only_op(&m, defs[0], 1);
        assert_eq!(m.attr(lit, "value"), Some(Attribute::Int(-3)));
    }
}
