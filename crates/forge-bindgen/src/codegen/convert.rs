//! Value conversion across the native/managed boundary
//!
//! [`Converter`] implements the two mutually recursive conversions, native
//! to managed and managed to native, as exhaustive matches over [`Type`].
//! Everything that depends on the host runtime (how to build an array, what
//! null looks like, the per-primitive tables) comes from an [`Embedding`].
//!
//! Struct conversions are generated lazily as free functions, at most once
//! per struct and direction, because some structs only ever cross the
//! boundary one way and could not be converted the other.

use crate::codegen::cpp::{CppFunc, CppVar};
use crate::error::{BindgenError, Result};
use crate::model::{
    BoundSpec, CallSite, ClassId, HandleOwner, Primitive, StructId, Template, TemplateKind, Type,
};
use crate::passes::JsView;
use indexmap::IndexMap;

/// Which way a value crosses the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Native value to managed value (return position)
    ToManaged,
    /// Managed value to native value (argument position)
    ToNative,
}

impl Direction {
    pub fn label(self) -> &'static str {
        match self {
            Direction::ToManaged => "to managed",
            Direction::ToNative => "to native",
        }
    }
}

/// Host-runtime syntax used by the generated C++
///
/// String arguments are C++ expressions; methods documented as statements
/// return complete statements.
pub trait Embedding {
    /// Short name used in diagnostics
    const NAME: &'static str;
    /// Prefix of generated helper names (`EMVAL_TO_CLASS_Foo`)
    const PREFIX: &'static str;
    /// C++ type of a managed value
    const VALUE: &'static str;

    /// Expression reaching the per-module addon instance
    fn addon(&self) -> String;

    /// `None` when the primitive does not convert in this direction
    fn primitive_to_managed(&self, primitive: Primitive, expr: &str) -> Option<String>;
    fn primitive_to_native(&self, primitive: Primitive, expr: &str) -> Option<String>;

    fn null(&self) -> String;
    fn undefined(&self) -> String;
    fn is_null(&self, value: &str) -> String;
    fn is_undefined(&self, value: &str) -> String;
    fn is_array(&self, value: &str) -> String;
    fn is_object(&self, value: &str) -> String;
    fn is_function(&self, value: &str) -> String;

    fn new_array(&self) -> String;
    /// Statement appending `item` to `array`
    fn array_push(&self, array: &str, item: &str) -> String;
    /// Length as `uint32_t`
    fn array_length(&self, array: &str) -> String;
    fn array_get(&self, array: &str, index: &str) -> String;

    fn new_object(&self) -> String;
    /// Statement setting `key` on `object`
    fn object_set(&self, object: &str, key: &str, value: &str) -> String;
    /// Property lookup; `key` is a C++ string literal
    fn object_get(&self, object: &str, key: &str) -> String;
    /// `func.bind(this_value)`
    fn bind_function(&self, func: &str, this_value: &str) -> String;

    /// Statement throwing a managed error carrying `message`
    fn throw_error(&self, message: &str) -> String;

    fn opaque_to_managed(&self, cpp_type: &str, expr: &str) -> String;
    fn opaque_to_native(&self, cpp_type: &str, expr: &str) -> String;

    /// Expression for the current entry's value inside [`Embedding::map_to_native`]
    fn map_entry_value(&self) -> String;
    /// Build a string-keyed native map from a managed object
    fn map_to_native(&self, map_type: &str, value: &str, expr: &str) -> String;

    /// Managed argument `index` inside a callback built by [`Embedding::func_to_managed`]
    fn callback_arg(&self, index: usize) -> String;
    /// Wrap a native callable `expr` as a managed function whose body returns `call`
    fn func_to_managed(&self, call: &str, expr: &str) -> String;
    /// Invoke the captured managed function `_cb`
    fn callback_invoke(&self, args: &[String]) -> String;
    /// Wrap a managed function `expr` as a native lambda
    fn func_to_native(&self, expr: &str, params: &str, ret: &str, body: &str) -> String;

    /// Extra leading parameter for helpers producing managed values
    fn env_param(&self) -> Option<CppVar>;
    /// Statement bringing the environment into scope from a managed value
    fn env_from(&self, value: &str) -> String;
    /// Call a generated helper that produces a managed value
    fn to_managed_helper(&self, name: &str, expr: &str) -> String;
}

/// Structural conversion over a bound model for one embedding
pub struct Converter<'v, 's, E: Embedding> {
    view: &'v JsView<'s>,
    embedding: &'v E,
    struct_funcs: IndexMap<(StructId, Direction), Option<CppFunc>>,
}

impl<'v, 's, E: Embedding> Converter<'v, 's, E> {
    pub fn new(view: &'v JsView<'s>, embedding: &'v E) -> Self {
        Self {
            view,
            embedding,
            struct_funcs: IndexMap::new(),
        }
    }

    fn spec(&self) -> &'s BoundSpec {
        self.view.spec
    }

    pub fn embedding(&self) -> &'v E {
        self.embedding
    }

    fn unconvertible(&self, ty: &Type, direction: Direction, reason: &str) -> BindgenError {
        BindgenError::Unconvertible {
            ty: self.spec().describe(ty),
            direction: direction.label(),
            embedding: E::NAME,
            reason: reason.to_string(),
        }
    }

    /// Struct conversion functions generated so far
    pub fn into_struct_funcs(self) -> Vec<CppFunc> {
        self.struct_funcs.into_values().flatten().collect()
    }

    /// Native expression to managed value
    pub fn to_managed(&mut self, ty: &Type, expr: &str) -> Result<String> {
        let e = self.embedding;
        let dir = Direction::ToManaged;
        Ok(match ty {
            Type::Primitive(Primitive::Mixed) => {
                e.to_managed_helper(&format!("{}_FROM_Mixed", E::PREFIX), expr)
            }
            Type::Primitive(Primitive::QueryArg) => {
                return Err(self.unconvertible(ty, dir, "query arguments only flow into native code"))
            }
            Type::Primitive(p) => e
                .primitive_to_managed(*p, expr)
                .ok_or_else(|| self.unconvertible(ty, dir, "no conversion for this primitive"))?,
            Type::Pointer(inner) => format!(
                "[&] (const auto& ptr) {{\n\
                 if constexpr (requires {{ bool(ptr); }}) {{\n\
                 BINDGEN_ASSERT(bool(ptr) && \"Nullable pointers must be declared as Nullable<>\");\n\
                 }}\n\
                 return {};\n\
                 }}({})",
                self.to_managed(inner, "*ptr")?,
                expr
            ),
            Type::Const(inner) | Type::Ref(inner) | Type::RRef(inner) => self.to_managed(inner, expr)?,
            Type::KeyType(id) => {
                let key = self.spec().key_type(*id);
                self.to_managed(&key.ty, &format!("({}).value", expr))?
            }
            Type::Opaque(id) => e.opaque_to_managed(&self.spec().opaque(*id).name, expr),
            Type::Enum(_) => e
                .primitive_to_managed(Primitive::Int32, &format!("int({})", expr))
                .ok_or_else(|| self.unconvertible(ty, dir, "enums need int32_t support"))?,
            Type::Class(id) => {
                let class = self.spec().class(*id);
                if class.is_shared() {
                    return Err(self.unconvertible(
                        ty,
                        dir,
                        "shared-pointer-wrapped classes must be returned as std::shared_ptr",
                    ));
                }
                if class.is_abstract {
                    return Err(self.unconvertible(ty, dir, "abstract classes cannot be returned by value"));
                }
                e.to_managed_helper(&format!("{}_FROM_CLASS_{}", E::PREFIX, class.name), expr)
            }
            Type::Struct(id) => {
                let name = self.struct_func(*id, dir)?;
                e.to_managed_helper(&name, expr)
            }
            Type::Template(t) => self.template_to_managed(ty, t, expr)?,
            Type::Func(func) => {
                let mut args = Vec::with_capacity(func.args.len());
                let mut index = 0;
                for arg in &func.args {
                    if arg.ty.is_template(TemplateKind::IgnoreArgument) {
                        args.push(format!("{}()", self.spec().cpp_type(&arg.ty)?));
                    } else {
                        args.push(self.to_native(&arg.ty, &e.callback_arg(index))?);
                        index += 1;
                    }
                }
                let call = self.to_managed(&func.ret, &format!("cb({})", args.join(", ")))?;
                e.func_to_managed(&call, expr)
            }
        })
    }

    fn template_to_managed(&mut self, ty: &Type, t: &Template, expr: &str) -> Result<String> {
        let e = self.embedding;
        let dir = Direction::ToManaged;
        let value = E::VALUE;
        let inner = &t.args[0];
        Ok(match t.kind {
            TemplateKind::SharedPtr => match inner {
                Type::Class(id) if self.spec().class(*id).is_shared() => e.to_managed_helper(
                    &format!("{}_FROM_SHARED_{}", E::PREFIX, self.spec().class(*id).name),
                    expr,
                ),
                _ => self.to_managed(&Type::Pointer(Box::new(inner.clone())), expr)?,
            },
            TemplateKind::Nullable => format!(
                "[&] (auto&& val) {{ return !val ? {value}({}) : {value}({}); }}({})",
                e.null(),
                self.to_managed(inner, "FWD(val)")?,
                expr,
            ),
            TemplateKind::Optional => format!(
                "[&] (auto&& opt) {{ return !opt ? {value}({}) : {value}({}); }}({})",
                e.undefined(),
                self.to_managed(inner, "*FWD(opt)")?,
                expr,
            ),
            TemplateKind::Vector => format!(
                "[&] (auto&& vec) {{\n\
                 auto out = {};\n\
                 for (auto&& e : vec) {{\n\
                 {}\n\
                 }}\n\
                 return out;\n\
                 }}({})",
                e.new_array(),
                e.array_push("out", &self.to_managed(inner, "e")?),
                expr
            ),
            TemplateKind::Pair | TemplateKind::Tuple => {
                let mut pushes = Vec::with_capacity(t.args.len());
                for (i, arg) in t.args.iter().enumerate() {
                    let item = self.to_managed(arg, &format!("std::get<{}>(FWD(tup))", i))?;
                    pushes.push(e.array_push("out", &item));
                }
                format!(
                    "[&] (auto&& tup) {{\n\
                     auto out = {}; // of size {}\n\
                     {}\n\
                     return out;\n\
                     }}({})",
                    e.new_array(),
                    t.args.len(),
                    pushes.join("\n"),
                    expr
                )
            }
            TemplateKind::Map | TemplateKind::UnorderedMap => format!(
                "[&] (auto&& map) {{\n\
                 auto out = {};\n\
                 for (auto&& [k, v] : map) {{\n\
                 {}\n\
                 }}\n\
                 return out;\n\
                 }}({})",
                e.new_object(),
                e.object_set("out", "k", &self.to_managed(&t.args[1], "v")?),
                expr
            ),
            TemplateKind::UniqueFunction | TemplateKind::Function | TemplateKind::AsyncCallback => {
                if !matches!(inner, Type::Func(_)) {
                    return Err(self.unconvertible(ty, dir, "callable templates must wrap a function type"));
                }
                self.to_managed(inner, &format!("FWD({})", expr))?
            }
            TemplateKind::AsyncResult => {
                return Err(self.unconvertible(ty, dir, "AsyncResult only appears in transformed signatures"))
            }
            TemplateKind::IgnoreArgument => {
                return Err(self.unconvertible(ty, dir, "ignored arguments are never converted"))
            }
        })
    }

    /// Managed expression to native value
    pub fn to_native(&mut self, ty: &Type, expr: &str) -> Result<String> {
        let e = self.embedding;
        let dir = Direction::ToNative;
        Ok(match ty {
            Type::Primitive(Primitive::Mixed) => format!("{}_TO_Mixed({})", E::PREFIX, expr),
            Type::Primitive(Primitive::QueryArg) => {
                let mixed = Type::Primitive(Primitive::Mixed);
                let list = Type::template(TemplateKind::Vector, vec![mixed.clone()]);
                format!(
                    "[&] (const {} v) -> QueryArg {{\n\
                     if ({}) {{\n\
                     return {};\n\
                     }} else {{\n\
                     return {};\n\
                     }}\n\
                     }}({})",
                    E::VALUE,
                    e.is_array("v"),
                    self.to_native(&list, "v")?,
                    self.to_native(&mixed, "v")?,
                    expr
                )
            }
            Type::Primitive(p) => e
                .primitive_to_native(*p, expr)
                .ok_or_else(|| self.unconvertible(ty, dir, "this primitive only flows out of native code"))?,
            Type::Pointer(inner) => format!("&({})", self.to_native(inner, expr)?),
            Type::Const(inner) | Type::Ref(inner) => self.to_native(inner, expr)?,
            Type::RRef(inner) => {
                let converted = self.to_native(inner, expr)?;
                // Moving out of a wrapped object would leave it empty, so classes are copied.
                if matches!(inner.as_ref(), Type::Class(_)) {
                    format!("BINDGEN_DECAY_COPY({})", converted)
                } else {
                    converted
                }
            }
            Type::KeyType(id) => {
                let key = self.spec().key_type(*id);
                format!("{}({})", key.name, self.to_native(&key.ty, expr)?)
            }
            Type::Opaque(id) => e.opaque_to_native(&self.spec().opaque(*id).name, expr),
            Type::Enum(id) => {
                let int = e
                    .primitive_to_native(Primitive::Int32, expr)
                    .ok_or_else(|| self.unconvertible(ty, dir, "enums need int32_t support"))?;
                format!("{}({})", self.spec().enumeration(*id).cpp_name, int)
            }
            Type::Class(id) => {
                let class = self.spec().class(*id);
                if class.is_shared() {
                    format!("*{}_TO_SHARED_{}({})", E::PREFIX, class.name, expr)
                } else {
                    format!("{}_TO_CLASS_{}({})", E::PREFIX, class.name, expr)
                }
            }
            Type::Struct(id) => format!("{}({})", self.struct_func(*id, dir)?, expr),
            Type::Template(t) => self.template_to_native(ty, t, expr)?,
            Type::Func(func) => {
                let mut params = Vec::with_capacity(func.args.len());
                let mut managed_args = Vec::new();
                for arg in &func.args {
                    let cpp = self.spec().cpp_type(&arg.ty)?;
                    if arg.ty.is_template(TemplateKind::IgnoreArgument) {
                        params.push(cpp);
                    } else {
                        params.push(format!("{} {}", cpp, arg.name));
                        managed_args.push(self.to_managed(&arg.ty, &format!("FWD({})", arg.name))?);
                    }
                }
                let body = self.to_native(&func.ret, &e.callback_invoke(&managed_args))?;
                let ret = self.spec().cpp_type(&func.ret)?;
                e.func_to_native(expr, &params.join(", "), &ret, &body)
            }
        })
    }

    fn template_to_native(&mut self, ty: &Type, t: &Template, expr: &str) -> Result<String> {
        let e = self.embedding;
        let dir = Direction::ToNative;
        let inner = &t.args[0];
        Ok(match t.kind {
            TemplateKind::SharedPtr => match inner {
                Type::Class(id) if self.spec().class(*id).is_shared() => {
                    format!("{}_TO_SHARED_{}({})", E::PREFIX, self.spec().class(*id).name, expr)
                }
                _ => format!(
                    "std::make_shared<{}>({})",
                    self.spec().cpp_type(inner)?,
                    self.to_native(inner, expr)?
                ),
            },
            TemplateKind::Nullable => format!(
                "[&] ({} val) {{ return {} ? {}() : {}; }}({})",
                E::VALUE,
                e.is_null("val"),
                self.spec().cpp_type(inner)?,
                self.to_native(inner, "val")?,
                expr
            ),
            TemplateKind::Optional => format!(
                "[&] ({} val) {{ return {} ? {}() : {}; }}({})",
                E::VALUE,
                e.is_undefined("val"),
                self.spec().cpp_type(ty)?,
                self.to_native(inner, "val")?,
                expr
            ),
            TemplateKind::Vector => format!(
                "[&] (const {} vec) {{\n\
                 if (!({})) {{\n\
                 {}\n\
                 }}\n\
                 auto out = std::vector<{}>();\n\
                 const uint32_t length = {};\n\
                 out.reserve(length);\n\
                 for (uint32_t i = 0; i < length; i++) {{\n\
                 out.push_back({});\n\
                 }}\n\
                 return out;\n\
                 }}({})",
                E::VALUE,
                e.is_array("vec"),
                e.throw_error("Expected an array"),
                self.spec().cpp_type(inner)?,
                e.array_length("vec"),
                self.to_native(inner, &e.array_get("vec", "i"))?,
                expr
            ),
            TemplateKind::Pair | TemplateKind::Tuple => {
                let n = t.args.len();
                let mut items = Vec::with_capacity(n);
                for (i, arg) in t.args.iter().enumerate() {
                    items.push(self.to_native(arg, &e.array_get("arr", &format!("{}u", i)))?);
                }
                let make = if t.kind == TemplateKind::Pair { "pair" } else { "tuple" };
                format!(
                    "[&] (const {} arr) {{\n\
                     if ({} != {}u) {{\n\
                     {}\n\
                     }}\n\
                     return std::make_{}({});\n\
                     }}({})",
                    E::VALUE,
                    e.array_length("arr"),
                    n,
                    e.throw_error(&format!("Need an array with exactly {} elements", n)),
                    make,
                    items.join(", "),
                    expr
                )
            }
            TemplateKind::Map | TemplateKind::UnorderedMap => {
                let key_is_string =
                    matches!(inner.remove_const_ref(), Type::Primitive(p) if p.is_string());
                if !key_is_string {
                    return Err(self.unconvertible(ty, dir, "only string-keyed maps convert into native code"));
                }
                let value = self.to_native(&t.args[1], &e.map_entry_value())?;
                e.map_to_native(&self.spec().cpp_type(ty)?, &value, expr)
            }
            TemplateKind::UniqueFunction | TemplateKind::Function | TemplateKind::AsyncCallback => {
                if !matches!(inner, Type::Func(_)) {
                    return Err(self.unconvertible(ty, dir, "callable templates must wrap a function type"));
                }
                format!("{}({})", self.spec().cpp_type(ty)?, self.to_native(inner, expr)?)
            }
            TemplateKind::AsyncResult => {
                return Err(self.unconvertible(ty, dir, "AsyncResult only appears in transformed signatures"))
            }
            TemplateKind::IgnoreArgument => {
                return Err(self.unconvertible(ty, dir, "ignored arguments are never converted"))
            }
        })
    }

    /// Name of the conversion function for a struct, generating it on first use
    fn struct_func(&mut self, id: StructId, direction: Direction) -> Result<String> {
        let record = self.view.record(id);
        let name = match direction {
            Direction::ToManaged => format!("STRUCT_TO_{}_{}", E::PREFIX, record.record.name),
            Direction::ToNative => format!("STRUCT_FROM_{}_{}", E::PREFIX, record.record.name),
        };
        if self.struct_funcs.contains_key(&(id, direction)) {
            return Ok(name);
        }
        // Reserve the slot first so self-referential structs terminate.
        self.struct_funcs.insert((id, direction), None);

        let e = self.embedding;
        let cpp_name = &record.record.cpp_name;
        let func = match direction {
            Direction::ToManaged => {
                let mut body = format!("auto out = {};\n", e.new_object());
                for field in &record.fields {
                    if field.field.ty.is_function() || !field.field.opted_in {
                        continue;
                    }
                    let value = self.to_managed(&field.field.ty, &format!("in.{}", field.field.cpp_name))?;
                    body.push_str(&e.object_set("out", &format!("\"{}\"", field.js_name), &value));
                    body.push('\n');
                }
                body.push_str("return out;");

                let mut args: Vec<CppVar> = e.env_param().into_iter().collect();
                args.push(CppVar::new(format!("const {}&", cpp_name), "in"));
                CppFunc::new(&name, E::VALUE, args).body(body)
            }
            Direction::ToNative => {
                for field in &record.fields {
                    if field.field.cpp_name.ends_with(')') {
                        return Err(BindgenError::MethodShapedField {
                            record: record.record.name.clone(),
                            field: field.field.name.clone(),
                            cpp_name: field.field.cpp_name.clone(),
                        });
                    }
                }

                let mut body = e.env_from("val");
                body.push_str(&format!(
                    "if (!({})) {{\n{}\n}}\nauto out = {}();\n",
                    e.is_object("val"),
                    e.throw_error(&format!("Expected an object for {}", record.js_name)),
                    cpp_name
                ));
                for field in &record.fields {
                    if !field.field.opted_in {
                        continue;
                    }
                    let value = self.to_native(&field.field.ty, "field")?;
                    body.push_str(&format!(
                        "{{\n\
                         auto field = {};\n\
                         if (!({})) {{\n\
                         // Functions on structs behave like bound methods.\n\
                         if ({}) {{\n\
                         field = {};\n\
                         }}\n\
                         out.{} = {};\n\
                         }} else if constexpr ({}) {{\n\
                         {}\n\
                         }}\n\
                         }}\n",
                        e.object_get("val", &format!("\"{}\"", field.js_name)),
                        e.is_undefined("field"),
                        e.is_function("field"),
                        e.bind_function("field", "val"),
                        field.field.cpp_name,
                        value,
                        field.field.required,
                        e.throw_error(&format!("{}::{} is required", record.js_name, field.js_name)),
                    ));
                }
                body.push_str("return out;");

                CppFunc::new(&name, cpp_name.as_str(), vec![CppVar::new(E::VALUE, "val")]).body(body)
            }
        };

        tracing::debug!(function = %name, "generated struct conversion");
        self.struct_funcs.insert((id, direction), Some(func));
        Ok(name)
    }
}

/// How a class reaches its native object from the stored handle
///
/// Handles always point at the handle owner's type (the root class, or the
/// shared pointer for wrapped classes); subclasses downcast.
#[derive(Debug, Clone)]
pub struct HandleCast {
    /// Type the stored pointer points at
    pub base: String,
    /// Type this class needs
    pub derived: String,
    delegated: bool,
    needs_deref: bool,
}

impl HandleCast {
    pub fn for_class(spec: &BoundSpec, id: ClassId) -> Self {
        let class = spec.class(id);
        let (base, derived) = if class.is_shared() {
            let shared = format!("std::shared_ptr<{}>", class.cpp_name);
            (shared.clone(), shared)
        } else {
            let owner = match spec.handle_owner(id) {
                HandleOwner::Root => id,
                HandleOwner::Delegated(root) => root,
            };
            (spec.class(owner).cpp_name.clone(), class.cpp_name.clone())
        };
        Self {
            base,
            derived,
            delegated: matches!(spec.handle_owner(id), HandleOwner::Delegated(_)),
            needs_deref: class.needs_deref,
        }
    }

    /// Downcast a `base*` expression to `derived*`
    pub fn cast(&self, base_ptr: &str) -> String {
        if self.delegated {
            format!("static_cast<{}*>({})", self.derived, base_ptr)
        } else {
            base_ptr.to_string()
        }
    }

    /// Upcast a `derived*` expression for storage
    pub fn upcast(&self, derived_ptr: &str) -> String {
        if self.delegated {
            format!("static_cast<{}*>({})", self.base, derived_ptr)
        } else {
            derived_ptr.to_string()
        }
    }

    /// Expressions a method body works with, given a `base*` expression
    pub fn call_site(&self, base_ptr: &str) -> CallSite {
        let ptr = self.cast(base_ptr);
        CallSite {
            self_expr: format!("({}{})", if self.needs_deref { "**" } else { "*" }, ptr),
            handle_expr: format!("(*{})", ptr),
        }
    }
}

/// `static_assert` conditions pinning every enum to its declared values
pub fn enum_static_asserts(spec: &BoundSpec) -> Vec<String> {
    let mut out = Vec::new();
    for enumeration in &spec.enums {
        out.push(format!(
            "sizeof({}) <= sizeof(int32_t), \"only enums up to 32 bits are supported\"",
            enumeration.cpp_name
        ));
        for enumerator in &enumeration.enumerators {
            out.push(format!(
                "{cpp}(int({value})) == {cpp}::{name}",
                cpp = enumeration.cpp_name,
                value = enumerator.value,
                name = enumerator.name
            ));
        }
    }
    out
}

/// Managed classes a `Mixed` object may be an instance of, with the injected
/// constructor to test against, in rough order of expected frequency
pub fn mixed_instance_types(view: &JsView<'_>) -> Vec<(Type, String)> {
    const CANDIDATES: [(&str, &str); 7] = [
        ("Obj", "Obj"),
        ("Timestamp", "Timestamp"),
        ("float", "Float"),
        ("ObjLink", "ObjLink"),
        ("ObjectId", "ObjectId"),
        ("Decimal128", "Decimal128"),
        ("UUID", "UUID"),
    ];
    let mut out = Vec::new();
    for (type_name, ctor) in CANDIDATES {
        let Some(ty) = view.spec.types.get(type_name) else {
            continue;
        };
        let injected = match ty {
            Type::Class(id) => Some(view.class(*id).js_name.clone()),
            Type::Primitive(_) => Some(ctor.to_string()),
            _ => None,
        };
        if let Some(ctor) = injected {
            out.push((ty.clone(), ctor));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::node::NodeEmbedding;
    use crate::codegen::wasm::WasmEmbedding;
    use crate::model::bind_model;
    use crate::spec::RawSpec;
    use pretty_assertions::assert_eq;

    const SPEC: &str = r#"
primitives = ["void", "bool", "int32_t", "int64_t", "double", "float", "count_t", "std::string",
  "StringData", "BinaryData", "Mixed", "QueryArg", "EJson", "AppError", "Status", "ObjectId",
  "std::chrono::milliseconds", "std::exception_ptr"]
opaqueTypes = ["Handle"]

[templates]
"std::vector" = 1
"std::optional" = 1
"Nullable" = 1
"std::shared_ptr" = 1
"std::pair" = 2
"std::tuple" = "*"
"std::map" = 2
"std::unordered_map" = 2
"util::UniqueFunction" = 1
"std::function" = 1
"AsyncCallback" = 1
"AsyncResult" = 1
"IgnoreArgument" = 1

[mixedInfo.dataTypes.Int]
type = "int64_t"
getter = "get_int"

[keyTypes]
ObjKey = "int64_t"

[enums.Color]
values = ["Red", "Green"]

[records.Point.fields]
x = "double"
label = { type = "std::optional<std::string>", cppName = "label_text" }
on_change = "std::function<(value: int32_t) -> void>"
hidden = "bool"

[records.Bad.fields]
size = { type = "int32_t", cppName = "size()" }

[classes.Foo]
sharedPtrWrapped = "SharedFoo"

[classes.Base]

[classes.Derived]
base = "Base"

[classes.Shape]
abstract = true
"#;

    fn fixture() -> BoundSpec {
        let raw = RawSpec::from_toml(SPEC).unwrap();
        let opt_in = crate::spec::OptInSpec::from_toml(
            "[records.Point]\nfields = [\"x\", \"label\", \"on_change\"]\n[records.Bad]\nfields = [\"size\"]\n",
        )
        .unwrap();
        bind_model(&raw, Some(&opt_in)).unwrap()
    }

    fn ty(spec: &BoundSpec, text: &str) -> Type {
        let parsed = crate::spec::parse_type(text).unwrap();
        resolve(spec, &parsed)
    }

    // Resolve through the builder's public surface by round-tripping a type alias.
    fn resolve(spec: &BoundSpec, parsed: &crate::spec::TypeSpec) -> Type {
        use crate::spec::TypeSpec;
        match parsed {
            TypeSpec::Name(name) => spec.types[name.as_str()].clone(),
            TypeSpec::Template { name, args } => Type::template(
                crate::model::TemplateKind::from_name(name).unwrap(),
                args.iter().map(|a| resolve(spec, a)).collect(),
            ),
            TypeSpec::Function(f) => Type::Func(crate::model::Func {
                ret: Box::new(resolve(spec, &f.ret)),
                args: f
                    .args
                    .iter()
                    .map(|a| crate::model::Arg {
                        name: a.name.clone(),
                        ty: resolve(spec, &a.ty),
                    })
                    .collect(),
                is_const: f.is_const,
                noexcept: f.is_noexcept,
                off_thread: f.is_off_thread,
            }),
            TypeSpec::Const(inner) => Type::Const(Box::new(resolve(spec, inner))),
            TypeSpec::Pointer(inner) => Type::Pointer(Box::new(resolve(spec, inner))),
            TypeSpec::Ref(inner) => Type::Ref(Box::new(resolve(spec, inner))),
            TypeSpec::RRef(inner) => Type::RRef(Box::new(resolve(spec, inner))),
        }
    }

    #[test]
    fn test_every_kind_converts_both_ways() {
        let spec = fixture();
        let view = JsView::new(&spec).unwrap();
        let wasm = WasmEmbedding::default();
        let node = NodeEmbedding::default();

        let both = [
            "bool",
            "int64_t",
            "float",
            "std::string",
            "Mixed",
            "const EJson*",
            "const std::string&",
            "Base&&",
            "ObjKey",
            "Handle",
            "Color",
            "Derived",
            "Point",
            "SharedFoo",
            "std::shared_ptr<std::string>",
            "Nullable<SharedFoo>",
            "std::optional<int32_t>",
            "std::vector<std::string>",
            "std::pair<int32_t, bool>",
            "std::tuple<int32_t, bool, std::string>",
            "std::map<std::string, int32_t>",
            "std::unordered_map<StringData, bool>",
            "util::UniqueFunction<(a: int32_t, b: IgnoreArgument<bool>) -> bool>",
            "std::function<() -> void>",
        ];
        for text in both {
            let t = ty(&spec, text);
            let mut wasm_conv = Converter::new(&view, &wasm);
            let mut node_conv = Converter::new(&view, &node);
            for (name, result) in [
                ("wasm to managed", wasm_conv.to_managed(&t, "x")),
                ("wasm to native", wasm_conv.to_native(&t, "x")),
                ("node to managed", node_conv.to_managed(&t, "x")),
                ("node to native", node_conv.to_native(&t, "x")),
            ] {
                result.unwrap_or_else(|e| panic!("{} {}: {}", name, text, e));
            }
        }
    }

    #[test]
    fn test_one_way_types() {
        let spec = fixture();
        let view = JsView::new(&spec).unwrap();
        let wasm = WasmEmbedding::default();
        let mut conv = Converter::new(&view, &wasm);

        assert!(conv.to_native(&ty(&spec, "QueryArg"), "x").is_ok());
        assert!(conv.to_managed(&ty(&spec, "QueryArg"), "x").is_err());
        assert!(conv.to_managed(&ty(&spec, "AppError"), "x").is_ok());
        assert!(conv.to_native(&ty(&spec, "AppError"), "x").is_err());
        assert!(conv.to_managed(&ty(&spec, "Status"), "x").is_ok());
        assert!(conv.to_managed(&ty(&spec, "std::exception_ptr"), "x").is_ok());

        // Completion callbacks only flow into native code.
        let completion = ty(&spec, "AsyncCallback<(err: std::optional<AppError>)>");
        assert!(conv.to_native(&completion, "x").is_ok());
        assert!(conv.to_managed(&completion, "x").is_err());
    }

    #[test]
    fn test_unconvertible_cases_fail_loudly() {
        let spec = fixture();
        let view = JsView::new(&spec).unwrap();
        let wasm = WasmEmbedding::default();
        let mut conv = Converter::new(&view, &wasm);

        let err = conv
            .to_native(&ty(&spec, "std::map<int32_t, bool>"), "x")
            .unwrap_err();
        assert!(matches!(
            err,
            BindgenError::Unconvertible { direction: "to native", embedding: "wasm", .. }
        ));
        assert!(conv.to_managed(&ty(&spec, "std::map<int32_t, bool>"), "x").is_ok());

        assert!(conv.to_managed(&ty(&spec, "AsyncResult<bool>"), "x").is_err());
        assert!(conv.to_native(&ty(&spec, "IgnoreArgument<bool>"), "x").is_err());
        assert!(conv.to_managed(&ty(&spec, "Foo"), "x").is_err());
        assert!(conv.to_managed(&ty(&spec, "Shape"), "x").is_err());
        assert!(conv.to_native(&ty(&spec, "Shape"), "x").is_ok());
    }

    #[test]
    fn test_wasm_shapes() {
        let spec = fixture();
        let view = JsView::new(&spec).unwrap();
        let wasm = WasmEmbedding::default();
        let mut conv = Converter::new(&view, &wasm);

        assert_eq!(
            conv.to_native(&ty(&spec, "Color"), "arg1").unwrap(),
            "Color((arg1).as<int32_t>())"
        );
        assert_eq!(
            conv.to_managed(&ty(&spec, "Color"), "v").unwrap(),
            "emscripten::val(int(v))"
        );
        assert_eq!(
            conv.to_native(&ty(&spec, "Base&&"), "a").unwrap(),
            "BINDGEN_DECAY_COPY(EMVAL_TO_CLASS_Base(a))"
        );
        assert_eq!(
            conv.to_native(&ty(&spec, "SharedFoo"), "a").unwrap(),
            "EMVAL_TO_SHARED_Foo(a)"
        );
        assert_eq!(conv.to_native(&ty(&spec, "Foo"), "a").unwrap(), "*EMVAL_TO_SHARED_Foo(a)");
        assert_eq!(
            conv.to_managed(&ty(&spec, "SharedFoo"), "r").unwrap(),
            "EMVAL_FROM_SHARED_Foo(r)"
        );
        assert_eq!(
            conv.to_native(&ty(&spec, "ObjKey"), "k").unwrap(),
            "ObjKey((k).as<int64_t>())"
        );

        let tuple = conv
            .to_native(&ty(&spec, "std::pair<int32_t, bool>"), "a")
            .unwrap();
        assert!(tuple.contains("Need an array with exactly 2 elements"));
        assert!(tuple.contains("std::make_pair("));
    }

    #[test]
    fn test_struct_functions_are_memoized() {
        let spec = fixture();
        let view = JsView::new(&spec).unwrap();
        let wasm = WasmEmbedding::default();
        let mut conv = Converter::new(&view, &wasm);

        let point = ty(&spec, "Point");
        assert_eq!(conv.to_managed(&point, "p").unwrap(), "STRUCT_TO_EMVAL_Point(p)");
        assert_eq!(conv.to_managed(&point, "q").unwrap(), "STRUCT_TO_EMVAL_Point(q)");
        assert_eq!(conv.to_native(&point, "v").unwrap(), "STRUCT_FROM_EMVAL_Point(v)");

        let funcs = conv.into_struct_funcs();
        assert_eq!(funcs.len(), 2);

        let to_managed = &funcs[0];
        assert!(to_managed.body.contains("out.set(\"x\""));
        assert!(to_managed.body.contains("in.label_text"));
        // Function fields and opted-out fields stay native.
        assert!(!to_managed.body.contains("onChange"));
        assert!(!to_managed.body.contains("hidden"));

        let to_native = &funcs[1];
        assert!(to_native.body.contains("val[\"onChange\"]"));
        assert!(to_native.body.contains("Point::x is required"));
        assert!(to_native.body.contains("else if constexpr (false)"));
        assert!(!to_native.body.contains("hidden"));
    }

    #[test]
    fn test_method_shaped_fields_are_rejected_into_native() {
        let spec = fixture();
        let view = JsView::new(&spec).unwrap();
        let wasm = WasmEmbedding::default();
        let mut conv = Converter::new(&view, &wasm);

        let bad = ty(&spec, "Bad");
        assert!(conv.to_managed(&bad, "b").is_ok());
        assert!(matches!(
            conv.to_native(&bad, "b"),
            Err(BindgenError::MethodShapedField { ref cpp_name, .. }) if cpp_name == "size()"
        ));
    }

    #[test]
    fn test_callbacks_invert_direction() {
        let spec = fixture();
        let view = JsView::new(&spec).unwrap();
        let wasm = WasmEmbedding::default();
        let mut conv = Converter::new(&view, &wasm);

        let cb = ty(&spec, "util::UniqueFunction<(a: int32_t, b: IgnoreArgument<bool>) -> bool>");
        let native = conv.to_native(&cb, "arg0").unwrap();
        // The managed callback receives managed values and returns a managed bool.
        assert!(native.starts_with("util::UniqueFunction<bool(int32_t, bool)>("));
        assert!(native.contains("int32_t a, bool"));
        assert!(native.contains("_cb(emscripten::val(FWD(a)))"));
        assert!(native.contains("as<bool>()"));
    }

    #[test]
    fn test_enum_static_asserts() {
        let spec = fixture();
        assert_eq!(
            enum_static_asserts(&spec),
            vec![
                "sizeof(Color) <= sizeof(int32_t), \"only enums up to 32 bits are supported\"".to_string(),
                "Color(int(0)) == Color::Red".to_string(),
                "Color(int(1)) == Color::Green".to_string(),
            ]
        );
    }

    #[test]
    fn test_mixed_instance_types_follow_declared_types() {
        let spec = fixture();
        let view = JsView::new(&spec).unwrap();
        let found: Vec<String> = mixed_instance_types(&view).into_iter().map(|(_, c)| c).collect();
        assert_eq!(found, vec!["Float", "ObjectId"]);
    }

    #[test]
    fn test_handle_casts() {
        let spec = fixture();
        let derived = spec.class_by_name("Derived").unwrap().id;
        let cast = HandleCast::for_class(&spec, derived);
        assert_eq!(cast.base, "Base");
        let site = cast.call_site("p");
        assert_eq!(site.self_expr, "(*static_cast<Derived*>(p))");
        assert_eq!(cast.upcast("q"), "static_cast<Base*>(q)");

        let foo = spec.class_by_name("Foo").unwrap().id;
        let cast = HandleCast::for_class(&spec, foo);
        assert_eq!(cast.base, "std::shared_ptr<Foo>");
        let site = cast.call_site("p");
        assert_eq!(site.self_expr, "(**p)");
        assert_eq!(site.handle_expr, "(*p)");
    }
}
