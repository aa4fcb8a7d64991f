//! Analysis pass - name and type checks between parsing and generation.
//!
//! This pass never fails the compilation on its own account except for
//! duplicate procedure names. Everything else it finds is a warning.
//!
//! ## Checks
//!
//! - `DUPLICATE_DECLARATION`: a variable declared twice in one scope
//!   (warning), or two procedures with the same name (error)
//! - `UNDECLARED_VARIABLE`: an assignment target that is not a local,
//!   parameter, module variable or the enclosing function's result
//! - `UNKNOWN_TYPE`: an `As` clause naming something outside the built-in
//!   type list
//!
//! Names are compared case-insensitively.

use rustc_hash::{FxHashMap, FxHashSet};
use vbstudio_core::{CompilerError, ErrorCode, Severity, Span};
use vbstudio_parser::Program;
use vbstudio_parser::ast::{Ident, ProcDecl, Stmt, VarDeclStmt};

/// Types the runtime knows about without a declaration.
pub const BUILTIN_TYPES: &[&str] = &[
    "Integer",
    "Long",
    "Single",
    "Double",
    "Currency",
    "Decimal",
    "Byte",
    "Boolean",
    "String",
    "Date",
    "Variant",
    "Object",
    "Collection",
    "Form",
    "Control",
    "TextBox",
    "Label",
    "CommandButton",
    "ListBox",
    "ComboBox",
    "CheckBox",
    "OptionButton",
    "Frame",
    "PictureBox",
    "Timer",
];

/// Whether `name` is one of [`BUILTIN_TYPES`], ignoring case.
pub fn is_builtin_type(name: &str) -> bool {
    BUILTIN_TYPES.iter().any(|ty| ty.eq_ignore_ascii_case(name))
}

/// Output of the analysis pass.
#[derive(Debug, Default)]
pub struct AnalysisOutput {
    pub errors: Vec<CompilerError>,
    pub warnings: Vec<CompilerError>,
}

impl AnalysisOutput {
    fn push(&mut self, diagnostic: CompilerError) {
        match diagnostic.severity {
            Severity::Error => self.errors.push(diagnostic),
            _ => self.warnings.push(diagnostic),
        }
    }
}

/// A set of declared names keyed by lowercase spelling.
#[derive(Debug, Default)]
struct Names {
    declared: FxHashSet<String>,
}

impl Names {
    /// Insert a name; returns false if it was already there.
    fn declare(&mut self, ident: &Ident<'_>) -> bool {
        self.declared.insert(ident.name.to_ascii_lowercase())
    }

    fn contains(&self, ident: &Ident<'_>) -> bool {
        self.declared.contains(&ident.name.to_ascii_lowercase())
    }
}

/// Walks a [`Program`] and collects diagnostics.
#[derive(Debug, Default)]
pub struct AnalysisPass {
    module_vars: Names,
    output: AnalysisOutput,
}

impl AnalysisPass {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the pass over a parsed program.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run(mut self, program: &Program<'_>) -> AnalysisOutput {
        // Module scope first so procedures can see variables declared below them
        let mut module_scope = Names::default();
        for stmt in program.statements {
            if let Stmt::VarDecl(decl) = stmt {
                self.declare_vars(decl, &mut module_scope);
            }
        }
        self.module_vars = module_scope;

        self.check_procedure_names(program);

        for stmt in program.statements {
            match stmt {
                Stmt::Sub(decl) => self.visit_procedure(decl, false),
                Stmt::Function(decl) => self.visit_procedure(decl, true),
                Stmt::Assign(assign) => {
                    let head = assign.target.head();
                    if !assign.target.is_dotted() && !self.module_vars.contains(head) {
                        self.undeclared(head);
                    }
                }
                _ => {}
            }
        }

        self.output
    }

    fn check_procedure_names(&mut self, program: &Program<'_>) {
        let mut seen: FxHashMap<String, Span> = FxHashMap::default();
        for decl in program.procedures() {
            let key = decl.name.name.to_ascii_lowercase();
            if let Some(first) = seen.get(&key) {
                self.output.push(CompilerError::at(
                    decl.name.span,
                    Severity::Error,
                    ErrorCode::DuplicateDeclaration,
                    format!(
                        "procedure '{}' is already declared at line {}",
                        decl.name.name, first.line
                    ),
                ));
            } else {
                seen.insert(key, decl.name.span);
            }
        }
    }

    fn declare_vars(&mut self, decl: &VarDeclStmt<'_>, scope: &mut Names) {
        for var in decl.vars {
            if !scope.declare(&var.name) {
                self.output.push(CompilerError::warning(
                    var.name.span,
                    ErrorCode::DuplicateDeclaration,
                    format!("variable '{}' is already declared in this scope", var.name.name),
                ));
            }
            if let Some(ty) = &var.ty {
                self.check_type(ty);
            }
        }
    }

    fn visit_procedure(&mut self, decl: &ProcDecl<'_>, returns_value: bool) {
        let mut params = Names::default();
        for param in decl.params {
            params.declare(&param.name);
            if let Some(ty) = &param.ty {
                self.check_type(ty);
            }
        }
        if let Some(ty) = &decl.return_type {
            self.check_type(ty);
        }

        let mut locals = Names::default();
        for stmt in decl.body {
            if let Stmt::VarDecl(var_decl) = stmt {
                self.declare_vars(var_decl, &mut locals);
            }
        }

        for stmt in decl.body {
            let Stmt::Assign(assign) = stmt else {
                continue;
            };
            if assign.target.is_dotted() {
                continue;
            }

            let head = assign.target.head();
            let known = locals.contains(head)
                || params.contains(head)
                || self.module_vars.contains(head)
                || (returns_value && head.is(decl.name.name));
            if !known {
                self.undeclared(head);
            }
        }
    }

    fn check_type(&mut self, ty: &Ident<'_>) {
        if !is_builtin_type(ty.name) {
            self.output.push(CompilerError::warning(
                ty.span,
                ErrorCode::UnknownType,
                format!("unknown type '{}'", ty.name),
            ));
        }
    }

    fn undeclared(&mut self, ident: &Ident<'_>) {
        self.output.push(CompilerError::warning(
            ident.span,
            ErrorCode::UndeclaredVariable,
            format!("variable '{}' is not declared", ident.name),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bumpalo::Bump;
    use vbstudio_core::{LexerLimits, ParserLimits};
    use vbstudio_parser::Parser;

    fn analyze(source: &str) -> AnalysisOutput {
        let arena = Bump::new();
        let (program, errors) =
            Parser::parse_source(source, &arena, &LexerLimits::default(), &ParserLimits::default())
                .unwrap();
        assert!(errors.is_empty(), "unexpected parse errors: {}", errors);
        AnalysisPass::new().run(&program)
    }

    fn codes(diagnostics: &[CompilerError]) -> Vec<ErrorCode> {
        diagnostics.iter().map(|d| d.code).collect()
    }

    #[test]
    fn clean_program_has_no_diagnostics() {
        let output = analyze(
            "Dim total As Integer\n\
             Sub Add(ByVal n As Integer)\n\
               Dim tmp As Long\n\
               tmp = n\n\
               total = total + tmp\n\
             End Sub",
        );
        assert!(output.errors.is_empty());
        assert!(output.warnings.is_empty(), "{:?}", output.warnings);
    }

    #[test]
    fn duplicate_dim_is_a_warning() {
        let output = analyze("Dim x As Integer\nDim X As String");
        assert!(output.errors.is_empty());
        assert_eq!(codes(&output.warnings), vec![ErrorCode::DuplicateDeclaration]);
        assert_eq!(output.warnings[0].line, 2);
    }

    #[test]
    fn same_name_in_different_scopes_is_fine() {
        let output = analyze("Dim x\nSub A()\n  Dim x\nEnd Sub\nSub B()\n  Dim x\nEnd Sub");
        assert!(output.warnings.is_empty());
    }

    #[test]
    fn duplicate_procedure_is_an_error() {
        let output = analyze("Sub Main()\nEnd Sub\nSub main()\nEnd Sub");
        assert_eq!(codes(&output.errors), vec![ErrorCode::DuplicateDeclaration]);
        assert_eq!(output.errors[0].line, 3);
        assert!(output.errors[0].message.contains("line 1"));
    }

    #[test]
    fn undeclared_assignment_target() {
        let output = analyze("Sub Main()\n  y = 1\nEnd Sub");
        assert_eq!(codes(&output.warnings), vec![ErrorCode::UndeclaredVariable]);
        assert!(output.warnings[0].message.contains("'y'"));
    }

    #[test]
    fn undeclared_at_module_level() {
        let output = analyze("z = 5");
        assert_eq!(codes(&output.warnings), vec![ErrorCode::UndeclaredVariable]);
    }

    #[test]
    fn dotted_targets_are_exempt() {
        let output = analyze("Sub Main()\n  Form1.Caption = \"hi\"\nEnd Sub");
        assert!(output.warnings.is_empty());
    }

    #[test]
    fn function_result_assignment_is_declared() {
        let source = "Function Twice(n As Integer) As Integer\n  twice = n * 2\nEnd Function";
        let output = analyze(source);
        assert!(output.warnings.is_empty(), "{:?}", output.warnings);
    }

    #[test]
    fn unknown_types_are_reported_everywhere() {
        let output = analyze(
            "Dim w As Widget\n\
             Function F(g As Gadget) As Thing\nEnd Function",
        );
        assert_eq!(
            codes(&output.warnings),
            vec![ErrorCode::UnknownType, ErrorCode::UnknownType, ErrorCode::UnknownType]
        );
    }

    #[test]
    fn builtin_types_ignore_case() {
        assert!(is_builtin_type("integer"));
        assert!(is_builtin_type("COMMANDBUTTON"));
        assert!(!is_builtin_type("Widget"));
    }
}
