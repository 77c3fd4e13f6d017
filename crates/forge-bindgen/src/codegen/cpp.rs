//! Minimal C++ declaration model
//!
//! Emitters collect variables, free functions and classes into a
//! [`CppDecls`] and render it once, so every function is declared before
//! any definition refers to it.

/// A variable, member or parameter
#[derive(Debug, Clone)]
pub struct CppVar {
    pub ty: String,
    pub name: String,
    pub is_static: bool,
}

impl CppVar {
    pub fn new(ty: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            name: name.into(),
            is_static: false,
        }
    }

    pub fn make_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    fn arg_definition(&self) -> String {
        format!("{} {}", self.ty, self.name)
    }

    pub fn definition(&self) -> String {
        let prefix = if self.is_static { "static " } else { "" };
        format!("{}{};", prefix, self.arg_definition())
    }

    fn static_definition(&self, class: &str) -> String {
        format!("{} {}::{};", self.ty, class, self.name)
    }
}

/// A free function or method
#[derive(Debug, Clone)]
pub struct CppFunc {
    pub name: String,
    pub ret: String,
    pub args: Vec<CppVar>,
    pub body: String,
    pub attributes: Option<String>,
    pub is_static: bool,
    pub is_const: bool,
    pub noexcept: bool,
}

impl CppFunc {
    pub fn new(name: impl Into<String>, ret: impl Into<String>, args: Vec<CppVar>) -> Self {
        Self {
            name: name.into(),
            ret: ret.into(),
            args,
            body: String::new(),
            attributes: None,
            is_static: false,
            is_const: false,
            noexcept: false,
        }
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn attributes(mut self, attributes: impl Into<String>) -> Self {
        self.attributes = Some(attributes.into());
        self
    }

    pub fn make_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    fn qualifiers(&self) -> String {
        let mut out = String::new();
        if self.is_const {
            out.push_str(" const");
        }
        if self.noexcept {
            out.push_str(" noexcept");
        }
        out
    }

    pub fn declaration(&self) -> String {
        let mut out = String::new();
        if let Some(attributes) = &self.attributes {
            out.push_str(attributes);
            out.push(' ');
        }
        if self.is_static {
            out.push_str("static ");
        }
        let args: Vec<String> = self.args.iter().map(CppVar::arg_definition).collect();
        out.push_str(&format!(
            "{} {}({}){};",
            self.ret,
            self.name,
            args.join(", "),
            self.qualifiers()
        ));
        out
    }

    /// Definition, qualified with `class` for methods
    pub fn definition(&self, class: Option<&str>) -> String {
        let name = match class {
            Some(class) => format!("{}::{}", class, self.name),
            None => self.name.clone(),
        };
        let args: Vec<String> = self.args.iter().map(CppVar::arg_definition).collect();
        format!(
            "{} {}({}){} {{\n{}\n}}\n",
            self.ret,
            name,
            args.join(", "),
            self.qualifiers(),
            self.body.trim_end()
        )
    }
}

#[derive(Debug, Clone)]
pub struct CppClass {
    pub name: String,
    pub bases: Vec<String>,
    pub methods: Vec<CppFunc>,
    pub members: Vec<CppVar>,
}

impl CppClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bases: Vec::new(),
            methods: Vec::new(),
            members: Vec::new(),
        }
    }

    pub fn fwd_decl(&self) -> String {
        format!("class {};", self.name)
    }

    pub fn definition(&self) -> String {
        let bases = if self.bases.is_empty() {
            String::new()
        } else {
            let bases: Vec<String> = self.bases.iter().map(|b| format!("public {}", b)).collect();
            format!(" : {}", bases.join(", "))
        };
        let mut out = format!("class {}{} {{\npublic:\n", self.name, bases);
        for method in &self.methods {
            out.push_str(&method.declaration());
            out.push('\n');
        }
        for member in &self.members {
            out.push_str(&member.definition());
            out.push('\n');
        }
        out.push_str("};\n");
        out
    }

    fn static_member_defs(&self) -> String {
        self.members
            .iter()
            .filter(|m| m.is_static)
            .map(|m| m.static_definition(&self.name) + "\n")
            .collect()
    }

    fn method_defs(&self) -> String {
        self.methods
            .iter()
            .map(|m| m.definition(Some(&self.name)))
            .collect()
    }
}

/// A translation unit's worth of declarations
#[derive(Debug, Clone, Default)]
pub struct CppDecls {
    pub classes: Vec<CppClass>,
    pub free_funcs: Vec<CppFunc>,
    pub free_vars: Vec<CppVar>,
    /// `static_assert` conditions, optionally followed by `, "message"`
    pub static_asserts: Vec<String>,
}

impl CppDecls {
    /// Render forward declarations, declarations and then definitions
    pub fn render(&self) -> String {
        let mut out = String::new();
        for class in &self.classes {
            out.push_str(&class.fwd_decl());
            out.push('\n');
        }
        for func in &self.free_funcs {
            out.push_str(&func.declaration());
            out.push('\n');
        }
        for var in &self.free_vars {
            out.push_str(&var.definition());
            out.push('\n');
        }
        for assertion in &self.static_asserts {
            out.push_str(&format!("static_assert({});\n", assertion));
        }
        for class in &self.classes {
            out.push_str(&class.definition());
        }
        for class in &self.classes {
            out.push_str(&class.static_member_defs());
            out.push_str(&class.method_defs());
        }
        for func in &self.free_funcs {
            out.push_str(&func.definition(None));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_function_declaration_and_definition() {
        let func = CppFunc::new(
            "EMVAL_TO_CLASS_Foo",
            "Foo&",
            vec![CppVar::new("emscripten::val", "val")],
        )
        .attributes("[[maybe_unused]]")
        .body("return *ptr;");

        assert_eq!(
            func.declaration(),
            "[[maybe_unused]] Foo& EMVAL_TO_CLASS_Foo(emscripten::val val);"
        );
        assert_eq!(
            func.definition(None),
            "Foo& EMVAL_TO_CLASS_Foo(emscripten::val val) {\nreturn *ptr;\n}\n"
        );
    }

    #[test]
    fn test_render_order() {
        let mut class = CppClass::new("Addon");
        class
            .members
            .push(CppVar::new("std::unique_ptr<Addon>", "self").make_static());
        class.methods.push(CppFunc::new("start", "void", vec![]).body("go();"));

        let decls = CppDecls {
            classes: vec![class],
            free_funcs: vec![CppFunc::new("helper", "int", vec![]).body("return 1;")],
            free_vars: vec![],
            static_asserts: vec!["sizeof(E) <= sizeof(int32_t)".into()],
        };
        let out = decls.render();

        let fwd = out.find("class Addon;").unwrap();
        let decl = out.find("int helper();").unwrap();
        let assertion = out.find("static_assert(sizeof(E) <= sizeof(int32_t));").unwrap();
        let def = out.find("class Addon {").unwrap();
        let static_def = out.find("std::unique_ptr<Addon> Addon::self;").unwrap();
        let method = out.find("void Addon::start()").unwrap();
        let helper = out.find("int helper() {").unwrap();
        assert!(fwd < decl && decl < assertion && assertion < def);
        assert!(def < static_def && static_def < method && method < helper);
        assert!(out.contains("static std::unique_ptr<Addon> self;"));
    }
}
