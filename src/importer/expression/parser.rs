// ==========================================
// FinView 导入引擎 - 表达式语法分析
// ==========================================
// 递归下降，优先级从低到高:
// 三元 < || < && < 相等 < 比较 < 加减 < 乘除模 < 一元 < 后缀
// ==========================================

use crate::importer::expression::error::{EvalError, EvalResult};
use crate::importer::expression::lexer::{tokenize, Spanned, Token};
use crate::importer::expression::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }
}

/// 语法树
///
/// 方法调用 `x.f(a)` 在解析时改写为 `f(x, a)`
#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    Literal(Value),
    Ident(String),
    List(Vec<Ast>),
    Index {
        target: Box<Ast>,
        index: Box<Ast>,
    },
    Call {
        function: String,
        args: Vec<Ast>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Ast>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Ast>,
        rhs: Box<Ast>,
    },
    And(Box<Ast>, Box<Ast>),
    Or(Box<Ast>, Box<Ast>),
    Conditional {
        condition: Box<Ast>,
        then_branch: Box<Ast>,
        else_branch: Box<Ast>,
    },
}

impl Ast {
    /// 深度优先遍历
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Ast)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }

    /// 树的层数（叶子为 1），用显式栈计算
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 1)];
        while let Some((node, level)) = stack.pop() {
            deepest = deepest.max(level);
            for child in node.children() {
                stack.push((child, level + 1));
            }
        }
        deepest
    }

    fn children(&self) -> Vec<&Ast> {
        match self {
            Ast::Literal(_) | Ast::Ident(_) => Vec::new(),
            Ast::List(items) => items.iter().collect(),
            Ast::Call { args, .. } => args.iter().collect(),
            Ast::Index { target, index } => vec![&**target, &**index],
            Ast::Unary { operand, .. } => vec![&**operand],
            Ast::Binary { lhs, rhs, .. } | Ast::And(lhs, rhs) | Ast::Or(lhs, rhs) => {
                vec![&**lhs, &**rhs]
            }
            Ast::Conditional {
                condition,
                then_branch,
                else_branch,
            } => vec![&**condition, &**then_branch, &**else_branch],
        }
    }
}

/// 表达式最多 token 数
pub const MAX_TOKENS: usize = 2048;

/// 语法树最大层数，同时限制解析时的嵌套
pub const MAX_DEPTH: usize = 128;

pub fn parse(source: &str) -> EvalResult<Ast> {
    let tokens = tokenize(source)?;
    if tokens.len() > MAX_TOKENS {
        return Err(EvalError::syntax(
            tokens[MAX_TOKENS].position,
            format!("表达式过长 (超过 {} 个符号)", MAX_TOKENS),
        ));
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let ast = parser.expr()?;
    if parser.peek() != &Token::Eof {
        return Err(EvalError::syntax(
            parser.position(),
            format!("多余的内容: {:?}", parser.peek()),
        ));
    }

    // 长运算链是左深树，解析时不计入 depth
    if ast.depth() > MAX_DEPTH {
        return Err(EvalError::syntax(
            0,
            format!("表达式嵌套过深 (超过 {} 层)", MAX_DEPTH),
        ));
    }
    Ok(ast)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// 当前 expr() 嵌套层数
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // tokenize 保证末尾有 Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)].token
    }

    fn position(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].position
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token, what: &str) -> EvalResult<()> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(EvalError::syntax(
                self.position(),
                format!("期望 {}, 实际 {:?}", what, self.peek()),
            ))
        }
    }

    fn expr(&mut self) -> EvalResult<Ast> {
        if self.depth >= MAX_DEPTH {
            return Err(EvalError::syntax(
                self.position(),
                format!("表达式嵌套过深 (超过 {} 层)", MAX_DEPTH),
            ));
        }
        self.depth += 1;
        let result = self.ternary();
        self.depth -= 1;
        result
    }

    fn ternary(&mut self) -> EvalResult<Ast> {
        let condition = self.or()?;
        if !self.eat(&Token::Question) {
            return Ok(condition);
        }
        let then_branch = self.expr()?;
        self.expect(Token::Colon, "':'")?;
        let else_branch = self.expr()?;
        Ok(Ast::Conditional {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    fn or(&mut self) -> EvalResult<Ast> {
        let mut lhs = self.and()?;
        while self.eat(&Token::OrOr) {
            let rhs = self.and()?;
            lhs = Ast::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> EvalResult<Ast> {
        let mut lhs = self.equality()?;
        while self.eat(&Token::AndAnd) {
            let rhs = self.equality()?;
            lhs = Ast::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn equality(&mut self) -> EvalResult<Ast> {
        let mut lhs = self.compare()?;
        loop {
            let op = match self.peek() {
                Token::EqEq => BinaryOp::Eq,
                Token::NotEq => BinaryOp::Ne,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.compare()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn compare(&mut self) -> EvalResult<Ast> {
        let mut lhs = self.additive()?;
        loop {
            let op = match self.peek() {
                Token::Lt => BinaryOp::Lt,
                Token::Le => BinaryOp::Le,
                Token::Gt => BinaryOp::Gt,
                Token::Ge => BinaryOp::Ge,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.additive()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn additive(&mut self) -> EvalResult<Ast> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.multiplicative()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn multiplicative(&mut self) -> EvalResult<Ast> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Rem,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.unary()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn unary(&mut self) -> EvalResult<Ast> {
        let mut ops = Vec::new();
        loop {
            match self.peek() {
                Token::Bang => ops.push(UnaryOp::Not),
                Token::Minus => ops.push(UnaryOp::Neg),
                _ => break,
            }
            self.advance();
        }

        let mut node = self.postfix()?;
        for op in ops.into_iter().rev() {
            node = Ast::Unary {
                op,
                operand: Box::new(node),
            };
        }
        Ok(node)
    }

    fn postfix(&mut self) -> EvalResult<Ast> {
        let mut node = self.primary()?;
        loop {
            if self.eat(&Token::LBracket) {
                let index = self.expr()?;
                self.expect(Token::RBracket, "']'")?;
                node = Ast::Index {
                    target: Box::new(node),
                    index: Box::new(index),
                };
            } else if self.eat(&Token::Dot) {
                let name = match self.advance() {
                    Token::Ident(name) => name,
                    other => {
                        return Err(EvalError::syntax(
                            self.position(),
                            format!("'.' 后期望方法名, 实际 {:?}", other),
                        ));
                    }
                };
                self.expect(Token::LParen, "'('")?;
                let mut args = vec![node];
                args.extend(self.args(Token::RParen)?);
                node = Ast::Call {
                    function: name,
                    args,
                };
            } else {
                return Ok(node);
            }
        }
    }

    fn primary(&mut self) -> EvalResult<Ast> {
        let position = self.position();
        match self.advance() {
            Token::Int(i) => Ok(Ast::Literal(Value::Int(i))),
            Token::Double(d) => Ok(Ast::Literal(Value::Double(d))),
            Token::Str(s) => Ok(Ast::Literal(Value::String(s))),
            Token::True => Ok(Ast::Literal(Value::Bool(true))),
            Token::False => Ok(Ast::Literal(Value::Bool(false))),
            Token::Null => Ok(Ast::Literal(Value::Null)),
            Token::Ident(name) => {
                if self.eat(&Token::LParen) {
                    let args = self.args(Token::RParen)?;
                    Ok(Ast::Call {
                        function: name,
                        args,
                    })
                } else {
                    Ok(Ast::Ident(name))
                }
            }
            Token::LParen => {
                let inner = self.expr()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::LBracket => Ok(Ast::List(self.args(Token::RBracket)?)),
            Token::Eof => Err(EvalError::syntax(position, "表达式不完整")),
            other => Err(EvalError::syntax(
                position,
                format!("意外的符号 {:?}", other),
            )),
        }
    }

    /// 逗号分隔的参数，起始括号已消费
    fn args(&mut self, close: Token) -> EvalResult<Vec<Ast>> {
        let mut args = Vec::new();
        if self.eat(&close) {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(close.clone(), "',' 或闭合括号")?;
            return Ok(args);
        }
    }
}

fn binary(op: BinaryOp, lhs: Ast, rhs: Ast) -> Ast {
    Ast::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}
