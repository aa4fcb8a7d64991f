//! Code generation - AST to JavaScript-flavoured text.
//!
//! The translation is structural. Every binary and unary expression is
//! wrapped in parentheses so the output never depends on the target's
//! precedence rules: `2 + 3 * 4` becomes `(2 + (3 * 4))`.

use vbstudio_parser::Program;
use vbstudio_parser::ast::{
    BinaryExpr, BinaryOp, CallExpr, Expr, Ident, IdentExpr, LiteralKind, ProcDecl, Stmt, UnaryOp,
    VarDeclStmt,
};

/// Indentation unit for nested statements.
const INDENT: &str = "  ";

/// Output formatting switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerateOptions {
    /// No indentation and no blank lines.
    pub minify: bool,
    /// Precede each statement with a `//# line N` marker.
    pub source_map: bool,
}

/// Generate output text for a whole program.
///
/// The result has no trailing newline; an empty program yields an empty
/// string.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn generate(program: &Program<'_>, options: &GenerateOptions) -> String {
    let mut emitter = Emitter::new(*options);
    let count = program.statements.len();
    for (i, stmt) in program.statements.iter().enumerate() {
        emitter.emit_stmt(stmt);
        let is_procedure = matches!(stmt, Stmt::Sub(_) | Stmt::Function(_));
        if is_procedure && i + 1 < count {
            emitter.blank_line();
        }
    }
    emitter.finish()
}

/// Default initializer for a variable of the given declared type.
pub fn default_value(ty: Option<&Ident<'_>>) -> &'static str {
    const NUMERIC: &[&str] = &[
        "Integer", "Long", "Single", "Double", "Currency", "Decimal", "Byte",
    ];

    match ty {
        Some(ty) if NUMERIC.iter().any(|n| ty.is(n)) => "0",
        Some(ty) if ty.is("String") => "\"\"",
        Some(ty) if ty.is("Boolean") => "false",
        _ => "null",
    }
}

/// Target spelling of a binary operator. `\` has no single-token form and
/// is handled by the emitter.
pub fn binary_op_str(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Or => "||",
        BinaryOp::And => "&&",
        BinaryOp::Equal => "===",
        BinaryOp::NotEqual => "!==",
        BinaryOp::Less => "<",
        BinaryOp::LessEqual => "<=",
        BinaryOp::Greater => ">",
        BinaryOp::GreaterEqual => ">=",
        BinaryOp::Add | BinaryOp::Concat => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div | BinaryOp::IntDiv => "/",
        BinaryOp::Mod => "%",
        BinaryOp::Pow => "**",
    }
}

fn unary_op_str(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Neg => "-",
        UnaryOp::Plus => "+",
        UnaryOp::Not => "!",
    }
}

/// Line-oriented text writer.
struct Emitter {
    out: String,
    indent: usize,
    options: GenerateOptions,
}

impl Emitter {
    fn new(options: GenerateOptions) -> Self {
        Self {
            out: String::new(),
            indent: 0,
            options,
        }
    }

    fn finish(self) -> String {
        self.out.trim_end_matches('\n').to_string()
    }

    fn line(&mut self, text: &str) {
        if !self.options.minify {
            for _ in 0..self.indent {
                self.out.push_str(INDENT);
            }
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn blank_line(&mut self) {
        if !self.options.minify {
            self.out.push('\n');
        }
    }

    fn line_marker(&mut self, stmt: &Stmt<'_>) {
        if self.options.source_map {
            self.line(&format!("//# line {}", stmt.span().line));
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn emit_stmt(&mut self, stmt: &Stmt<'_>) {
        self.line_marker(stmt);
        match stmt {
            Stmt::VarDecl(decl) => self.emit_var_decl(decl),
            Stmt::Sub(decl) => self.emit_procedure(decl, false),
            Stmt::Function(decl) => self.emit_procedure(decl, true),
            Stmt::Expr(stmt) => {
                let text = match &stmt.expr {
                    // A bare name on its own line is a call with no arguments
                    Expr::Ident(ident) => format!("{}();", path_str(ident)),
                    expr => format!("{};", expr_str(expr)),
                };
                self.line(&text);
            }
            Stmt::Assign(assign) => {
                let text = format!("{} = {};", path_str(&assign.target), expr_str(&assign.value));
                self.line(&text);
            }
            Stmt::Raw(raw) => self.line(&format!("// {}", raw.text)),
        }
    }

    fn emit_var_decl(&mut self, decl: &VarDeclStmt<'_>) {
        for var in decl.vars {
            let text = format!("let {} = {};", var.name.name, default_value(var.ty.as_ref()));
            self.line(&text);
        }
    }

    fn emit_procedure(&mut self, decl: &ProcDecl<'_>, returns_value: bool) {
        let params: Vec<&str> = decl.params.iter().map(|p| p.name.name).collect();
        self.line(&format!("function {}({}) {{", decl.name.name, params.join(", ")));

        self.indent += 1;
        if returns_value {
            let text = format!(
                "let {} = {};",
                decl.name.name,
                default_value(decl.return_type.as_ref())
            );
            self.line(&text);
        }
        for stmt in decl.body {
            self.emit_stmt(stmt);
        }
        if returns_value {
            self.line(&format!("return {};", decl.name.name));
        }
        self.indent -= 1;

        self.line("}");
    }
}

// ============================================================================
// Expressions
// ============================================================================

/// Render an expression.
pub fn expr_str(expr: &Expr<'_>) -> String {
    match expr {
        Expr::Literal(lit) => match lit.kind {
            LiteralKind::Int(value) => value.to_string(),
            LiteralKind::Float(value) => value.to_string(),
            LiteralKind::Bool(value) => value.to_string(),
            LiteralKind::String(value) => quote(value),
        },
        Expr::Ident(ident) => path_str(ident),
        Expr::Binary(binary) => binary_str(binary),
        Expr::Unary(unary) => format!("({}{})", unary_op_str(unary.op), expr_str(unary.operand)),
        Expr::Call(call) => call_str(call),
        Expr::Paren(paren) => match paren.expr {
            Expr::Binary(_) | Expr::Unary(_) => expr_str(paren.expr),
            inner => format!("({})", expr_str(inner)),
        },
    }
}

fn binary_str(binary: &BinaryExpr<'_>) -> String {
    let left = expr_str(binary.left);
    let right = expr_str(binary.right);
    match binary.op {
        BinaryOp::IntDiv => format!("Math.trunc({} / {})", left, right),
        op => format!("({} {} {})", left, binary_op_str(op), right),
    }
}

fn call_str(call: &CallExpr<'_>) -> String {
    let args: Vec<String> = call.args.iter().map(expr_str).collect();
    format!("{}({})", expr_str(call.callee), args.join(", "))
}

fn path_str(ident: &IdentExpr<'_>) -> String {
    let segments: Vec<&str> = ident.path.iter().map(|segment| segment.name).collect();
    segments.join(".")
}

/// Quote a string value with JSON escaping.
fn quote(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
