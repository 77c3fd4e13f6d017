//! Emscripten native module generator (`wasm_init.cpp`)
//!
//! Exposes one free function per opted-in method through
//! `EMSCRIPTEN_BINDINGS`. Wrapper objects hold native handles as integers
//! (heap addresses); the managed side frees them through the per-class
//! `_deleter` functions registered with a `FinalizationRegistry`.

use super::convert::{
    enum_static_asserts, mixed_instance_types, Converter, Embedding, HandleCast,
};
use super::cpp::{CppClass, CppDecls, CppFunc, CppVar};
use super::helpers;
use super::{ctor_member, extractor_member, is_constructible, ADDON_CLASS, INJECTABLES};
use crate::error::Result;
use crate::model::{BoundSpec, Primitive, Type};
use crate::passes::{JsClass, JsView};

const VALUE: &str = "emscripten::val";

fn addon_self() -> String {
    format!("{}::self", ADDON_CLASS)
}

/// emscripten `val` syntax
#[derive(Debug, Default, Clone, Copy)]
pub struct WasmEmbedding;

impl WasmEmbedding {
    fn ctor(&self, name: &str) -> String {
        format!("{}->{}", self.addon(), ctor_member(name))
    }

    fn string_to_managed(&self, expr: &str) -> String {
        format!(
            "([&] (auto&& sd) {{\n\
             return emscripten::val(std::string(sd.data(), sd.size()));\n\
             }}({}))",
            expr
        )
    }

    fn string_to_native(&self, expr: &str) -> String {
        format!("{}->wrapString(({}).as<std::string>())", self.addon(), expr)
    }
}

impl Embedding for WasmEmbedding {
    const NAME: &'static str = "wasm";
    const PREFIX: &'static str = "EMVAL";
    const VALUE: &'static str = VALUE;

    fn addon(&self) -> String {
        addon_self()
    }

    fn primitive_to_managed(&self, primitive: Primitive, expr: &str) -> Option<String> {
        Some(match primitive {
            Primitive::Void => format!("((void)({}), emscripten::val::undefined())", expr),
            Primitive::Bool => format!("emscripten::val(bool({}))", expr),
            Primitive::Double | Primitive::Int32 | Primitive::Int64 | Primitive::UInt64 => {
                format!("emscripten::val({})", expr)
            }
            Primitive::Float => format!("{}.new_(emscripten::val(double({})))", self.ctor("Float"), expr),
            Primitive::UIntFast16 => format!("emscripten::val(int({}))", expr),
            Primitive::Count => format!("emscripten::val(double(std::make_signed_t<size_t>({})))", expr),
            Primitive::Milliseconds => format!(
                "emscripten::val(double(std::chrono::milliseconds({}).count()))",
                expr
            ),
            Primitive::String | Primitive::StringView | Primitive::StringData => {
                self.string_to_managed(expr)
            }
            Primitive::BinaryData => format!(
                "([&] (const auto& bd) -> emscripten::val {{\n\
                 emscripten::val typed_array(emscripten::typed_memory_view(bd.size(), bd.data()));\n\
                 return typed_array.call<emscripten::val>(\"slice\")[\"buffer\"];\n\
                 }}({}))",
                expr
            ),
            Primitive::OwnedBinaryData => {
                return self.primitive_to_managed(Primitive::BinaryData, &format!("({}).get()", expr))
            }
            Primitive::ObjectId | Primitive::Uuid | Primitive::Decimal128 => format!(
                "{}.new_({})",
                self.ctor(primitive.cpp_name()),
                self.string_to_managed(&format!("({}).to_string()", expr))
            ),
            Primitive::EJson | Primitive::EJsonObj | Primitive::EJsonArray => format!(
                "{}({})",
                self.ctor("EJSON_parse"),
                self.string_to_managed(expr)
            ),
            Primitive::BsonDocument | Primitive::BsonArray => {
                return self.primitive_to_managed(
                    Primitive::EJsonObj,
                    &format!("bson::Bson({}).to_string()", expr),
                )
            }
            Primitive::AppError => format!(
                "([&] (const app::AppError& err) {{\n\
                 auto jsErr = emscripten::val::global(\"Error\")(emscripten::val(err.what()));\n\
                 jsErr.set(\"code\", double(err.code()));\n\
                 return jsErr;\n\
                 }}({}))",
                expr
            ),
            Primitive::ExceptionPtr => format!("toEmscriptenException({})", expr),
            Primitive::ErrorCode => format!("toEmscriptenErrorCode({})", expr),
            Primitive::Status => format!(
                "([&] (const Status& status) {{\n\
                 if (status.is_ok()) {{\n\
                 return emscripten::val::undefined();\n\
                 }}\n\
                 return {}.new_(emscripten::val(int(status.code())), emscripten::val(status.reason()));\n\
                 }}({}))",
                self.ctor("Status"),
                expr
            ),
            Primitive::EncryptionKey | Primitive::Mixed | Primitive::QueryArg => return None,
        })
    }

    fn primitive_to_native(&self, primitive: Primitive, expr: &str) -> Option<String> {
        Some(match primitive {
            Primitive::Void => format!("((void)({}))", expr),
            Primitive::Bool => format!("({}).as<bool>()", expr),
            Primitive::Double => format!("({}).as<double>()", expr),
            Primitive::Float => format!("({})[\"value\"].as<float>()", expr),
            Primitive::Int32 => format!("({}).as<int32_t>()", expr),
            Primitive::Int64 => format!("({}).as<int64_t>()", expr),
            Primitive::UInt64 => format!("({}).as<uint64_t>()", expr),
            Primitive::UIntFast16 => format!("std::uint_fast16_t(({}).as<int>())", expr),
            // Going through a signed value keeps -1 (npos) intact.
            Primitive::Count => format!("size_t(int64_t(({}).as<double>()))", expr),
            Primitive::Milliseconds => format!("std::chrono::milliseconds(({}).as<int64_t>())", expr),
            Primitive::String | Primitive::StringView | Primitive::StringData => {
                self.string_to_native(expr)
            }
            Primitive::BinaryData => format!(
                "BinaryData({}->wrapString(toBinaryData({})))",
                self.addon(),
                expr
            ),
            Primitive::OwnedBinaryData => format!("toOwnedBinaryData({})", expr),
            Primitive::ObjectId | Primitive::Uuid | Primitive::Decimal128 => format!(
                "{}(({}).call<std::string>(\"toString\").c_str())",
                primitive.cpp_name(),
                expr
            ),
            Primitive::EJson | Primitive::EJsonObj | Primitive::EJsonArray => {
                self.string_to_native(&format!("{}({})", self.ctor("EJSON_stringify"), expr))
            }
            Primitive::BsonDocument | Primitive::BsonArray => format!(
                "{}(bson::parse({}))",
                primitive.cpp_name(),
                self.primitive_to_native(Primitive::EJsonObj, expr)?
            ),
            Primitive::EncryptionKey
            | Primitive::Mixed
            | Primitive::QueryArg
            | Primitive::AppError
            | Primitive::ExceptionPtr
            | Primitive::ErrorCode
            | Primitive::Status => return None,
        })
    }

    fn null(&self) -> String {
        "emscripten::val::null()".to_string()
    }

    fn undefined(&self) -> String {
        "emscripten::val::undefined()".to_string()
    }

    fn is_null(&self, value: &str) -> String {
        format!("({}).isNull()", value)
    }

    fn is_undefined(&self, value: &str) -> String {
        format!("({}).isUndefined()", value)
    }

    fn is_array(&self, value: &str) -> String {
        format!("({}).isArray()", value)
    }

    fn is_object(&self, value: &str) -> String {
        format!(
            "!({0}).isNull() && ({0}).typeOf().as<std::string>() == \"object\"",
            value
        )
    }

    fn is_function(&self, value: &str) -> String {
        format!("({}).instanceof(emscripten::val::global(\"Function\"))", value)
    }

    fn new_array(&self) -> String {
        "emscripten::val::array()".to_string()
    }

    fn array_push(&self, array: &str, item: &str) -> String {
        format!("{}.call<void>(\"push\", {});", array, item)
    }

    fn array_length(&self, array: &str) -> String {
        format!("{}[\"length\"].as<uint32_t>()", array)
    }

    fn array_get(&self, array: &str, index: &str) -> String {
        format!("{}[{}]", array, index)
    }

    fn new_object(&self) -> String {
        "emscripten::val::object()".to_string()
    }

    fn object_set(&self, object: &str, key: &str, value: &str) -> String {
        format!("{}.set({}, {});", object, key, value)
    }

    fn object_get(&self, object: &str, key: &str) -> String {
        format!("{}[{}]", object, key)
    }

    fn bind_function(&self, func: &str, this_value: &str) -> String {
        format!("{}.call<emscripten::val>(\"bind\", {})", func, this_value)
    }

    fn throw_error(&self, message: &str) -> String {
        format!(
            "emscripten::val::global(\"Error\")(emscripten::val(\"{}\")).throw_();",
            message
        )
    }

    fn opaque_to_managed(&self, _cpp_type: &str, expr: &str) -> String {
        format!("emscripten::val(reinterpret_cast<std::uintptr_t>(&({})))", expr)
    }

    fn opaque_to_native(&self, cpp_type: &str, expr: &str) -> String {
        format!(
            "(*(reinterpret_cast<{}*>(({}).as<std::uintptr_t>())))",
            cpp_type, expr
        )
    }

    fn map_entry_value(&self) -> String {
        "entries[i][1]".to_string()
    }

    fn map_to_native(&self, map_type: &str, value: &str, expr: &str) -> String {
        format!(
            "[&] (const emscripten::val obj) {{\n\
             auto out = {}();\n\
             auto entries = emscripten::val::global(\"Object\")[\"entries\"](obj);\n\
             const auto length = entries[\"length\"].as<uint32_t>();\n\
             for (uint32_t i = 0; i < length; i++) {{\n\
             out.insert({{entries[i][0].as<std::string>(), {}}});\n\
             }}\n\
             return out;\n\
             }}({})",
            map_type, value, expr
        )
    }

    fn callback_arg(&self, index: usize) -> String {
        format!("args[{}]", index)
    }

    fn func_to_managed(&self, call: &str, expr: &str) -> String {
        // The callable lives on the heap and is reached from JS through
        // `_internal_callback` with its address.
        // TODO: free the trampoline once the managed function is collected.
        format!(
            "[&] (auto&& cb_in) -> emscripten::val {{\n\
             auto shared = std::make_shared<std::decay_t<decltype(cb_in)>>(FWD(cb_in));\n\
             auto* fn = new std::function<emscripten::val(emscripten::val)>([shared] (emscripten::val args) -> emscripten::val {{\n\
             auto& cb = *shared;\n\
             const auto callBlock = {}->startCall();\n\
             try {{\n\
             return {};\n\
             }} catch (const std::exception& ex) {{\n\
             toEmscriptenException(ex).throw_();\n\
             }}\n\
             BINDGEN_UNREACHABLE();\n\
             }});\n\
             int handle = EM_ASM_INT({{\n\
             var fn = function() {{\n\
             return Module[\"_internal_callback\"]($0, Array.from(arguments));\n\
             }};\n\
             return Emval.toHandle(fn);\n\
             }}, reinterpret_cast<std::uintptr_t>(fn));\n\
             return emscripten::val::take_ownership((emscripten::EM_VAL)(handle));\n\
             }}({})",
            self.addon(),
            call,
            expr
        )
    }

    fn callback_invoke(&self, args: &[String]) -> String {
        format!("_cb({})", args.join(", "))
    }

    fn func_to_native(&self, expr: &str, params: &str, ret: &str, body: &str) -> String {
        format!(
            "[_cb = FWD({})] ({}) -> {} {{\n\
             return {};\n\
             }}",
            expr, params, ret, body
        )
    }

    fn env_param(&self) -> Option<CppVar> {
        None
    }

    fn env_from(&self, _value: &str) -> String {
        String::new()
    }

    fn to_managed_helper(&self, name: &str, expr: &str) -> String {
        format!("{}({})", name, expr)
    }
}

/// A native function exported to JS, taking `arg_count` values
fn exported_func(name: &str, arg_count: usize, body: &str) -> CppFunc {
    let args = (0..arg_count)
        .map(|i| CppVar::new(format!("const {}", VALUE), format!("arg{}", i)))
        .collect();
    CppFunc::new(name, VALUE, args).body(format!(
        "const auto callBlock = {}->startCall();\n\
         try {{\n\
         {}\n\
         }} catch (const std::exception& ex) {{\n\
         toEmscriptenException(ex).throw_();\n\
         }}\n\
         BINDGEN_UNREACHABLE();",
        addon_self(),
        body
    ))
}

/// Generator for the emscripten native module
pub struct WasmGenerator<'a> {
    spec: &'a BoundSpec,
}

impl<'a> WasmGenerator<'a> {
    pub fn new(spec: &'a BoundSpec) -> Self {
        Self { spec }
    }

    /// Generate `wasm_init.cpp`, without the generated-file header
    pub fn generate(&self) -> Result<String> {
        let view = JsView::new(self.spec)?;
        let embedding = WasmEmbedding;
        let mut conv = Converter::new(&view, &embedding);

        let mut decls = CppDecls {
            static_asserts: enum_static_asserts(self.spec),
            ..CppDecls::default()
        };
        // (exported name, C++ function)
        let mut exports: Vec<(String, String)> = Vec::new();

        for class in &view.classes {
            self.generate_class(class, &mut conv, &mut decls.free_funcs, &mut exports)?;
        }

        decls.free_funcs.push(
            CppFunc::new(
                "_internal_iterator",
                VALUE,
                vec![CppVar::new("std::uintptr_t", "address")],
            )
            .body(
                "auto* step = reinterpret_cast<std::function<emscripten::val()>*>(address);\n\
                 emscripten::val result = (*step)();\n\
                 // The last step owns the closure.\n\
                 if (!result[\"done\"].isUndefined()) {\n\
                 delete step;\n\
                 }\n\
                 return result;",
            ),
        );
        decls.free_funcs.push(
            CppFunc::new(
                "_internal_callback",
                VALUE,
                vec![
                    CppVar::new("std::uintptr_t", "address"),
                    CppVar::new(VALUE, "args"),
                ],
            )
            .body(
                "auto* fn = reinterpret_cast<std::function<emscripten::val(emscripten::val)>*>(address);\n\
                 return (*fn)(args);",
            ),
        );
        exports.push(("_internal_iterator".into(), "_internal_iterator".into()));
        exports.push(("_internal_callback".into(), "_internal_callback".into()));

        let mixed = self.mixed_helpers(&view, &mut conv)?;
        decls.free_funcs.extend(mixed);
        decls.free_funcs.extend(conv.into_struct_funcs());

        decls.free_funcs.push(CppFunc::new("wasm_init", "void", vec![]).body(format!(
            "if (!{0}) {{\n{0} = std::make_unique<{1}>();\n}}",
            addon_self(),
            ADDON_CLASS
        )));
        decls.free_funcs.push(
            CppFunc::new("injectExternalTypes", "void", vec![CppVar::new(VALUE, "val")])
                .body(format!("{}->injectInjectables(val);", addon_self())),
        );
        exports.push(("wasmInit".into(), "wasm_init".into()));
        exports.push(("injectInjectables".into(), "injectExternalTypes".into()));

        decls.classes.push(self.addon_class(&view));

        let mut output = String::new();
        for header in &self.spec.headers {
            output.push_str(&format!("#include <{}>\n", header));
        }
        output.push_str("#include <emscripten/bind.h>\n");
        output.push_str(&format!("#include \"{}\"\n", helpers::COMMON_HEADER));
        output.push_str(&format!("#include \"{}\"\n\n", helpers::WASM_HEADER));
        output.push_str("namespace bindgen::wasm {\nnamespace {\n\n");
        output.push_str(&decls.render());

        output.push_str("\nEMSCRIPTEN_BINDINGS(bindgen_native) {\nusing emscripten::function;\n");
        for (name, func) in &exports {
            output.push_str(&format!("function(\"{}\", &{});\n", name, func));
        }
        output.push_str("}\n\n");
        output.push_str("} // namespace\n} // namespace bindgen::wasm\n");

        tracing::debug!(functions = exports.len(), "generated wasm module");
        Ok(output)
    }

    fn generate_class(
        &self,
        class: &JsClass<'_>,
        conv: &mut Converter<'_, '_, WasmEmbedding>,
        funcs: &mut Vec<CppFunc>,
        exports: &mut Vec<(String, String)>,
    ) -> Result<()> {
        let e = conv.embedding();
        let cast = HandleCast::for_class(self.spec, class.id);
        let raw = |expr: &str| {
            format!(
                "reinterpret_cast<{}*>(({}).as<std::uintptr_t>())",
                cast.base, expr
            )
        };
        let site = cast.call_site(&raw("arg0"));

        for method in class.methods.iter().filter(|m| m.opted_in) {
            // Instance methods receive the handle as arg0.
            let offset = usize::from(!method.is_static());
            let mut args = Vec::with_capacity(method.sig.args.len());
            for (i, arg) in method.sig.args.iter().enumerate() {
                args.push(conv.to_native(&arg.ty, &format!("arg{}", i + offset))?);
            }
            let call = method.call(&site, &args);
            let body = format!("return {};", conv.to_managed(&method.sig.ret, &call)?);
            funcs.push(exported_func(
                &method.cpp_ident(),
                method.sig.args.len() + offset,
                &body,
            ));
            exports.push((method.id(), method.cpp_ident()));
        }

        if let Some(item) = &class.iterable {
            let value = conv.to_managed(item, "*begin")?;
            let body = format!(
                "emscripten::val jsIt = emscripten::val::object();\n\
                 auto& self = {};\n\
                 auto* step = new std::function<emscripten::val()>(\
                 [begin = std::make_move_iterator(self.begin()), end = std::make_move_iterator(self.end())] () mutable {{\n\
                 emscripten::val result = emscripten::val::object();\n\
                 if (begin == end) {{\n\
                 result.set(\"done\", true);\n\
                 }} else {{\n\
                 result.set(\"value\", {});\n\
                 ++begin;\n\
                 }}\n\
                 return result;\n\
                 }});\n\
                 int handle = EM_ASM_INT({{\n\
                 var next = function() {{\n\
                 return Module[\"_internal_iterator\"]($0);\n\
                 }};\n\
                 return Emval.toHandle(next);\n\
                 }}, reinterpret_cast<std::uintptr_t>(step));\n\
                 jsIt.set(\"next\", emscripten::val::take_ownership((emscripten::EM_VAL)(handle)));\n\
                 return jsIt;",
                site.self_expr, value
            );
            let id = class.iterator_method_id();
            funcs.push(exported_func(&id, 1, &body));
            exports.push((id.clone(), id));
        }

        let shared = class.is_shared();
        let kind = if shared { "SHARED" } else { "CLASS" };
        let ref_type = if shared {
            format!("const {}&", cast.derived)
        } else {
            format!("{}&", cast.derived)
        };
        let null_check = if shared {
            format!(
                "if (!*ptr) {{\n{}\n}}\n",
                e.throw_error(&format!(
                    "Attempting to use an instance of {} holding a null shared_ptr. Did you call $resetSharedPtr on it already?",
                    class.name
                ))
            )
        } else {
            String::new()
        };
        funcs.push(
            CppFunc::new(
                format!("EMVAL_TO_{}_{}", kind, class.name),
                ref_type,
                vec![CppVar::new(VALUE, "val")],
            )
            .attributes("[[maybe_unused]]")
            .body(format!(
                "emscripten::val external = {}->{}(val);\n\
                 const auto ptr = {};\n\
                 {}return *ptr;",
                addon_self(),
                extractor_member(&class.js_name),
                cast.cast(&raw("external")),
                null_check
            )),
        );

        if is_constructible(class) {
            let assertion = if shared {
                "BINDGEN_ASSERT(bool(val) && \"Nullable pointers must be declared as Nullable<>\");\n"
            } else {
                ""
            };
            funcs.push(
                CppFunc::new(
                    format!("EMVAL_FROM_{}_{}", kind, class.name),
                    VALUE,
                    vec![CppVar::new(cast.derived.as_str(), "val")],
                )
                .attributes("[[maybe_unused]]")
                .body(format!(
                    "{}return {}->{}.new_(emscripten::val(reinterpret_cast<std::uintptr_t>({})));",
                    assertion,
                    addon_self(),
                    ctor_member(&class.js_name),
                    cast.upcast("new auto(std::move(val))")
                )),
            );
            let deleter = format!("{}_deleter", class.name);
            funcs.push(
                CppFunc::new(&deleter, "void", vec![CppVar::new(VALUE, "pointer")])
                    .body(format!("delete {};", cast.cast(&raw("pointer")))),
            );
            exports.push((deleter.clone(), deleter));
        }

        tracing::debug!(class = %class.name, "generated wasm class bindings");
        Ok(())
    }

    fn mixed_helpers(
        &self,
        view: &JsView<'_>,
        conv: &mut Converter<'_, '_, WasmEmbedding>,
    ) -> Result<Vec<CppFunc>> {
        let info = &self.spec.mixed_info;

        let mut from = String::from(
            "if (val.is_null()) {\nreturn emscripten::val::null();\n}\nswitch (val.get_type()) {\n",
        );
        for getter in &info.getters {
            from.push_str(&format!(
                "case DataType::Type::{}:\nreturn {};\n",
                getter.data_type,
                conv.to_managed(&getter.ty, &format!("val.{}()", getter.getter))?
            ));
        }
        if !info.unused_data_types.is_empty() {
            from.push_str("// Never stored in a Mixed.\n");
        }
        for unused in &info.unused_data_types {
            from.push_str(&format!("case DataType::Type::{}:\nbreak;\n", unused));
        }
        from.push_str("}\nBINDGEN_UNREACHABLE();");

        let mut instance_checks = String::new();
        for (ty, ctor) in mixed_instance_types(view) {
            instance_checks.push_str(&format!(
                "if (val.instanceof({}->{})) {{\nreturn {};\n}}\n",
                addon_self(),
                ctor_member(&ctor),
                conv.to_native(&ty, "val")?
            ));
        }

        let string = Type::Primitive(Primitive::StringData);
        let binary = Type::Primitive(Primitive::BinaryData);
        let to = format!(
            "auto type = val.typeOf().as<std::string>();\n\
             if (type == \"string\") {{\n\
             return {};\n\
             }} else if (type == \"boolean\") {{\n\
             return {};\n\
             }} else if (type == \"number\") {{\n\
             return val.as<double>();\n\
             }} else if (type == \"bigint\") {{\n\
             return val.as<int64_t>();\n\
             }} else if (type == \"object\") {{\n\
             if (val.isNull()) {{\n\
             return Mixed();\n\
             }}\n\
             if (val.instanceof(emscripten::val::global(\"ArrayBuffer\"))) {{\n\
             return {};\n\
             }}\n\
             if (val.instanceof(emscripten::val::global(\"DataView\"))) {{\n\
             return {};\n\
             }}\n\
             {}\
             const auto ctorName = val[\"constructor\"][\"name\"].as<std::string>();\n\
             emscripten::val::global(\"Error\")(emscripten::val(\"Unable to convert an object with ctor '\" + ctorName + \"' to a Mixed\")).throw_();\n\
             }}\n\
             // undefined is not null here, otherwise std::optional<Mixed> would be ambiguous.\n\
             emscripten::val::global(\"Error\")(emscripten::val(\"Can't convert \" + type + \" to Mixed\")).throw_();\n\
             BINDGEN_UNREACHABLE();",
            conv.to_native(&string, "val")?,
            conv.to_native(&Type::Primitive(Primitive::Bool), "val")?,
            conv.to_native(&binary, "val")?,
            conv.to_native(&binary, "val[\"buffer\"]")?,
            instance_checks
        );

        Ok(vec![
            CppFunc::new("EMVAL_FROM_Mixed", VALUE, vec![CppVar::new("Mixed", "val")]).body(from),
            CppFunc::new("EMVAL_TO_Mixed", "Mixed", vec![CppVar::new(VALUE, "val")]).body(to),
        ])
    }

    fn addon_class(&self, view: &JsView<'_>) -> CppClass {
        let mut addon = CppClass::new(ADDON_CLASS);
        addon
            .members
            .push(CppVar::new(format!("std::unique_ptr<{}>", ADDON_CLASS), "self").make_static());
        addon
            .members
            .push(CppVar::new("std::deque<std::string>", "m_string_bufs"));
        addon.methods.push(
            CppFunc::new(
                "wrapString",
                "const std::string&",
                vec![CppVar::new("std::string", "str")],
            )
            .attributes("inline")
            .body("return m_string_bufs.emplace_back(std::move(str));"),
        );
        addon.methods.push(
            CppFunc::new("startCall", "auto", vec![])
                .attributes("inline")
                .body("return ContainerResizer(m_string_bufs);"),
        );

        let mut inject = String::new();
        for name in INJECTABLES {
            addon.members.push(CppVar::new(VALUE, ctor_member(name)));
            inject.push_str(&format!("{} = args[\"{}\"];\n", ctor_member(name), name));
        }
        for class in &view.classes {
            addon.members.push(CppVar::new(VALUE, ctor_member(&class.js_name)));
            addon.members.push(CppVar::new(VALUE, extractor_member(&class.js_name)));
            inject.push_str(&format!(
                "{} = args[\"{}\"];\n{} = {}[\"_extract\"];\n",
                ctor_member(&class.js_name),
                class.js_name,
                extractor_member(&class.js_name),
                ctor_member(&class.js_name)
            ));
        }
        addon.methods.push(
            CppFunc::new(
                "injectInjectables",
                "void",
                vec![CppVar::new(format!("const {}", VALUE), "args")],
            )
            .body(inject),
        );
        addon
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::fixtures::{bind, SPEC};
    use crate::error::BindgenError;

    fn generate(toml: &str) -> Result<String> {
        WasmGenerator::new(&bind(toml)).generate()
    }

    #[test]
    fn test_method_functions() {
        let out = generate(SPEC).unwrap();
        assert!(out.starts_with("#include <foo/foo.hpp>\n"));
        assert!(out.contains("#include \"bindgen_helpers.h\"\n#include \"bindgen_wasm_helpers.h\"\n"));
        assert!(out.contains(
            "emscripten::val Foo_bar(const emscripten::val arg0, const emscripten::val arg1);"
        ));
        assert!(out.contains(
            "return emscripten::val(bool((**reinterpret_cast<std::shared_ptr<Foo>*>((arg0).as<std::uintptr_t>())).bar((arg1).as<int32_t>())));"
        ));
        assert!(out.contains("function(\"Foo_bar\", &Foo_bar);"));
        assert!(out.contains("function(\"Foo_$addr\", &Foo__dollar_addr);"));
        assert!(out.contains("function(\"Foo_$resetSharedPtr\", &Foo__dollar_resetSharedPtr);"));
        assert!(out.contains("(*reinterpret_cast<std::shared_ptr<Foo>*>((arg0).as<std::uintptr_t>())).reset()"));
    }

    #[test]
    fn test_subclass_handles_downcast() {
        let out = generate(SPEC).unwrap();
        assert!(out.contains(
            "return emscripten::val((*static_cast<Square*>(reinterpret_cast<Shape*>((arg0).as<std::uintptr_t>()))).side());"
        ));
        assert!(out.contains("return EMVAL_FROM_CLASS_Square(Square::make(STRUCT_FROM_EMVAL_Person(arg0)));"));
        assert!(out.contains("delete static_cast<Square*>(reinterpret_cast<Shape*>((pointer).as<std::uintptr_t>()));"));
        assert!(out.contains("reinterpret_cast<std::uintptr_t>(static_cast<Shape*>(new auto(std::move(val))))"));
        // Abstract classes are never created from native values.
        assert!(!out.contains("EMVAL_FROM_CLASS_Shape"));
        assert!(!out.contains("Shape_deleter"));
        assert!(out.contains("function(\"Square_deleter\", &Square_deleter);"));
    }

    #[test]
    fn test_class_helpers_and_iterators() {
        let out = generate(SPEC).unwrap();
        assert!(out.contains("[[maybe_unused]] const std::shared_ptr<Foo>& EMVAL_TO_SHARED_Foo(emscripten::val val);"));
        assert!(out.contains("Did you call $resetSharedPtr on it already?"));
        assert!(out.contains("BindgenAddon::self->m_cls_Foo_extractor(val)"));
        assert!(out.contains("function(\"Shape_Symbol_iterator\", &Shape_Symbol_iterator);"));
        assert!(out.contains("Module[\"_internal_iterator\"]($0)"));
        assert!(out.contains("m_cls_Square_extractor = m_cls_Square_ctor[\"_extract\"];"));
        assert!(out.contains("m_cls_Float_ctor = args[\"Float\"];"));
        assert!(out.contains("m_cls_Int64_ctor = args[\"Int64\"];"));
        assert!(out.contains("m_cls_ArrayBuffer_ctor = args[\"ArrayBuffer\"];"));
    }

    #[test]
    fn test_async_method_takes_native_completion() {
        let out = generate(SPEC).unwrap();
        assert!(out.contains("emscripten::val Foo_connect(const emscripten::val arg0, const emscripten::val arg1);"));
        assert!(out.contains("util::UniqueFunction<void(const EJson*, std::optional<AppError>)>([_cb = FWD(arg1)] (const EJson* result, std::optional<AppError> err) -> void {"));
        assert!(out.contains("BindgenAddon::self->m_cls_EJSON_parse_ctor("));
    }

    #[test]
    fn test_module_scaffolding() {
        let out = generate(SPEC).unwrap();
        assert!(out.contains("static_assert(Color(int(1)) == Color::Green);"));
        assert!(out.contains("case DataType::Type::Int:\nreturn emscripten::val(val.get_int());"));
        assert!(out.contains("case DataType::Type::Link:\nbreak;"));
        assert!(out.contains("function(\"wasmInit\", &wasm_init);"));
        assert!(out.contains("function(\"injectInjectables\", &injectExternalTypes);"));
        assert!(out.contains("STRUCT_FROM_EMVAL_Person(emscripten::val val)"));
        assert!(out.trim_end().ends_with("} // namespace bindgen::wasm"));
    }

    #[test]
    fn test_unconvertible_signature_fails_generation() {
        let toml = format!(
            "{}\n[classes.Bad.methods]\ntake = \"(m: std::map<int32_t, bool>) -> void\"\n",
            SPEC
        );
        assert!(matches!(
            generate(&toml),
            Err(BindgenError::Unconvertible { embedding: "wasm", .. })
        ));
    }

    #[test]
    fn test_output_is_stable() {
        assert_eq!(generate(SPEC).unwrap(), generate(SPEC).unwrap());
    }
}
