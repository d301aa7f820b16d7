//! Structured Python source builder.
//!
//! Generated modules are assembled from these types and serialized in one
//! place, so indentation and string escaping are never hand-formatted.

use std::collections::BTreeSet;

const INDENT: &str = "    ";

/// Quote `value` as a Python string literal.
pub fn py_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn docstring(text: &str) -> String {
    format!("\"\"{}\"\"", py_string(text))
}

fn push_line(out: &mut String, level: usize, line: &str) {
    if !line.is_empty() {
        out.push_str(&INDENT.repeat(level));
        out.push_str(line);
    }
    out.push('\n');
}

// ============================================================================
// Statements
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Code; embedded newlines are indented with the enclosing block
    Line(String),
    Comment(String),
    /// `header:` followed by an indented body
    Block { header: String, body: Vec<Stmt> },
}

impl Stmt {
    pub fn line(code: impl Into<String>) -> Self {
        Stmt::Line(code.into())
    }

    pub fn block(header: impl Into<String>, body: Vec<Stmt>) -> Self {
        Stmt::Block {
            header: header.into(),
            body,
        }
    }

    fn render(&self, out: &mut String, level: usize) {
        match self {
            Stmt::Line(code) => {
                for line in code.lines() {
                    push_line(out, level, line);
                }
            }
            Stmt::Comment(text) => push_line(out, level, &format!("# {}", text)),
            Stmt::Block { header, body } => {
                push_line(out, level, &format!("{}:", header));
                render_body(out, level + 1, body);
            }
        }
    }
}

fn render_body(out: &mut String, level: usize, body: &[Stmt]) {
    if body.is_empty() {
        push_line(out, level, "pass");
    }
    for stmt in body {
        stmt.render(out, level);
    }
}

// ============================================================================
// Functions / classes / modules
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub decorators: Vec<String>,
    pub params: Vec<String>,
    pub returns: Option<String>,
    pub docstring: Option<String>,
    pub body: Vec<Stmt>,
}

impl FunctionDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            decorators: Vec::new(),
            params: Vec::new(),
            returns: None,
            docstring: None,
            body: Vec::new(),
        }
    }

    pub fn with_decorator(mut self, decorator: impl Into<String>) -> Self {
        self.decorators.push(decorator.into());
        self
    }

    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.params.push(param.into());
        self
    }

    pub fn with_returns(mut self, annotation: impl Into<String>) -> Self {
        self.returns = Some(annotation.into());
        self
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.docstring = Some(doc.into());
        self
    }

    pub fn with_stmt(mut self, stmt: Stmt) -> Self {
        self.body.push(stmt);
        self
    }

    pub fn with_line(self, code: impl Into<String>) -> Self {
        self.with_stmt(Stmt::line(code))
    }

    pub fn render(&self, out: &mut String, level: usize) {
        for decorator in &self.decorators {
            push_line(out, level, &format!("@{}", decorator));
        }
        let returns = self
            .returns
            .as_ref()
            .map(|r| format!(" -> {}", r))
            .unwrap_or_default();
        push_line(
            out,
            level,
            &format!("def {}({}){}:", self.name, self.params.join(", "), returns),
        );
        if let Some(doc) = &self.docstring {
            push_line(out, level + 1, &docstring(doc));
            for stmt in &self.body {
                stmt.render(out, level + 1);
            }
        } else {
            render_body(out, level + 1, &self.body);
        }
    }

    /// This function alone, at top level.
    pub fn to_source(&self) -> String {
        let mut out = String::new();
        self.render(&mut out, 0);
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub name: String,
    pub docstring: Option<String>,
    pub methods: Vec<FunctionDef>,
}

impl ClassDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            docstring: None,
            methods: Vec::new(),
        }
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.docstring = Some(doc.into());
        self
    }

    pub fn with_method(mut self, method: FunctionDef) -> Self {
        self.methods.push(method);
        self
    }

    fn render(&self, out: &mut String, level: usize) {
        push_line(out, level, &format!("class {}:", self.name));
        if let Some(doc) = &self.docstring {
            push_line(out, level + 1, &docstring(doc));
        } else if self.methods.is_empty() {
            push_line(out, level + 1, "pass");
        }
        for (i, method) in self.methods.iter().enumerate() {
            if i > 0 || self.docstring.is_some() {
                out.push('\n');
            }
            method.render(out, level + 1);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Class(ClassDef),
    Function(FunctionDef),
}

/// A whole Python module: docstring, sorted imports, constants, then
/// classes and functions in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceModule {
    pub docstring: String,
    pub imports: BTreeSet<String>,
    pub constants: Vec<(String, String)>,
    pub items: Vec<Item>,
}

impl SourceModule {
    pub fn new(docstring: impl Into<String>) -> Self {
        Self {
            docstring: docstring.into(),
            ..Self::default()
        }
    }

    pub fn import(&mut self, line: impl Into<String>) {
        self.imports.insert(line.into());
    }

    /// `NAME = expr`; the value is emitted verbatim.
    pub fn constant(&mut self, name: impl Into<String>, expr: impl Into<String>) {
        self.constants.push((name.into(), expr.into()));
    }

    pub fn class(&mut self, class: ClassDef) {
        self.items.push(Item::Class(class));
    }

    pub fn function(&mut self, function: FunctionDef) {
        self.items.push(Item::Function(function));
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        push_line(&mut out, 0, &docstring(&self.docstring));

        if !self.imports.is_empty() {
            out.push('\n');
            for import in &self.imports {
                push_line(&mut out, 0, import);
            }
        }

        if !self.constants.is_empty() {
            out.push('\n');
            for (name, expr) in &self.constants {
                push_line(&mut out, 0, &format!("{} = {}", name, expr));
            }
        }

        for item in &self.items {
            out.push_str("\n\n");
            match item {
                Item::Class(class) => class.render(&mut out, 0),
                Item::Function(function) => function.render(&mut out, 0),
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn py_string_escapes_quotes_and_backslashes() {
        assert_eq!(py_string(r#"say "hi" \o/"#), r#""say \"hi\" \\o/""#);
        assert_eq!(py_string("a\nb"), r#""a\nb""#);
    }

    #[test]
    fn nested_blocks_are_indented() {
        let function = FunctionDef::new("check")
            .with_param("x")
            .with_stmt(Stmt::block("if x", vec![Stmt::line("return 1")]))
            .with_line("return 0");

        assert_eq!(
            function.to_source(),
            "def check(x):\n    if x:\n        return 1\n    return 0\n"
        );
    }

    #[test]
    fn empty_function_gets_pass() {
        assert_eq!(FunctionDef::new("noop").to_source(), "def noop():\n    pass\n");
    }

    #[test]
    fn module_layout() {
        let mut module = SourceModule::new("Doc.");
        module.import("import re");
        module.import("import os");
        module.constant("X", "1");
        module.class(
            ClassDef::new("A").with_method(FunctionDef::new("f").with_param("self")),
        );

        assert_eq!(
            module.render(),
            "\"\"\"Doc.\"\"\"\n\nimport os\nimport re\n\nX = 1\n\n\nclass A:\n    def f(self):\n        pass\n"
        );
    }
}
