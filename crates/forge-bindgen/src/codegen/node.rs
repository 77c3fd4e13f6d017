//! N-API native module generator (`node_init.cpp`)
//!
//! Same flat function table as the emscripten module, but handles are
//! `Napi::External`s whose finalizers delete the native object, so no
//! explicit deleters are exported.

use super::convert::{
    enum_static_asserts, mixed_instance_types, Converter, Embedding, HandleCast,
};
use super::cpp::{CppClass, CppDecls, CppFunc, CppVar};
use super::helpers;
use super::{ctor_member, extractor_member, is_constructible, ADDON_CLASS, INJECTABLES};
use crate::error::Result;
use crate::model::{BoundSpec, Primitive, Type};
use crate::passes::{JsClass, JsView};

/// Always in scope wherever generated code converts values
const ENV: &str = "napi_env_var_ForBindGen";

const VALUE: &str = "Napi::Value";

fn addon() -> String {
    format!("{}.GetInstanceData<{}>()", ENV, ADDON_CLASS)
}

/// node-addon-api syntax
#[derive(Debug, Default, Clone, Copy)]
pub struct NodeEmbedding;

impl NodeEmbedding {
    fn ctor(&self, name: &str) -> String {
        format!("{}->{}", addon(), ctor_member(name))
    }

    fn string_to_managed(&self, expr: &str) -> String {
        format!(
            "([&] (auto&& sd) {{\n\
             return Napi::String::New({}, sd.data(), sd.size());\n\
             }}({}))",
            ENV, expr
        )
    }

    fn string_to_native(&self, expr: &str) -> String {
        format!(
            "{}->wrapString(({}).As<Napi::String>().Utf8Value())",
            addon(),
            expr
        )
    }

    fn buffer_to_managed(&self, expr: &str) -> String {
        format!(
            "([&] (const auto& bd) -> Napi::Value {{\n\
             auto arr = Napi::ArrayBuffer::New({}, bd.size());\n\
             memcpy(arr.Data(), bd.data(), bd.size());\n\
             return arr;\n\
             }}({}))",
            ENV, expr
        )
    }
}

impl Embedding for NodeEmbedding {
    const NAME: &'static str = "node";
    const PREFIX: &'static str = "NODE";
    const VALUE: &'static str = VALUE;

    fn addon(&self) -> String {
        addon()
    }

    fn primitive_to_managed(&self, primitive: Primitive, expr: &str) -> Option<String> {
        Some(match primitive {
            Primitive::Void => format!("((void)({}), {}.Undefined())", expr, ENV),
            Primitive::Bool => format!("Napi::Boolean::New({}, {})", ENV, expr),
            Primitive::Double | Primitive::Int32 => format!("Napi::Number::New({}, {})", ENV, expr),
            Primitive::UIntFast16 => format!("Napi::Number::New({}, int({}))", ENV, expr),
            Primitive::Float => format!(
                "{}.New({{Napi::Number::New({}, double({}))}})",
                self.ctor("Float"),
                ENV,
                expr
            ),
            Primitive::Int64 | Primitive::UInt64 => format!("Napi::BigInt::New({}, {})", ENV, expr),
            Primitive::Count => format!(
                "Napi::Number::New({}, double(std::make_signed_t<size_t>({})))",
                ENV, expr
            ),
            Primitive::Milliseconds => format!(
                "Napi::Number::New({}, double(std::chrono::milliseconds({}).count()))",
                ENV, expr
            ),
            Primitive::String | Primitive::StringView | Primitive::StringData => {
                self.string_to_managed(expr)
            }
            Primitive::BinaryData | Primitive::EncryptionKey => self.buffer_to_managed(expr),
            Primitive::OwnedBinaryData => self.buffer_to_managed(&format!("({}).get()", expr)),
            Primitive::ObjectId | Primitive::Uuid | Primitive::Decimal128 => format!(
                "{}.New({{{}}})",
                self.ctor(primitive.cpp_name()),
                self.string_to_managed(&format!("({}).to_string()", expr))
            ),
            Primitive::EJson | Primitive::EJsonObj | Primitive::EJsonArray => format!(
                "{}.Call({{{}}})",
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
                "([&] (const app::AppError& err) -> Napi::Value {{\n\
                 auto jsErr = Napi::Error::New({}, std::string(err.what()));\n\
                 jsErr.Set(\"code\", double(err.code()));\n\
                 return jsErr.Value();\n\
                 }}({}))",
                ENV, expr
            ),
            Primitive::ExceptionPtr => format!("toNodeException({}, {})", ENV, expr),
            Primitive::ErrorCode => format!("toNodeErrorCode({}, {})", ENV, expr),
            Primitive::Status => format!(
                "([&] (const Status& status) -> Napi::Value {{\n\
                 if (status.is_ok()) {{\n\
                 return {env}.Undefined();\n\
                 }}\n\
                 return {}.New({{Napi::Number::New({env}, int(status.code())), Napi::String::New({env}, status.reason())}});\n\
                 }}({}))",
                self.ctor("Status"),
                expr,
                env = ENV
            ),
            Primitive::Mixed | Primitive::QueryArg => return None,
        })
    }

    fn primitive_to_native(&self, primitive: Primitive, expr: &str) -> Option<String> {
        Some(match primitive {
            Primitive::Void => format!("((void)({}))", expr),
            Primitive::Bool => format!("({}).As<Napi::Boolean>().Value()", expr),
            Primitive::Double => format!("({}).As<Napi::Number>().DoubleValue()", expr),
            Primitive::Float => format!(
                "({}).As<Napi::Object>().Get(\"value\").As<Napi::Number>().FloatValue()",
                expr
            ),
            Primitive::Int32 => format!("({}).As<Napi::Number>().Int32Value()", expr),
            Primitive::Int64 => format!("extractInt64FromNode({})", expr),
            Primitive::UInt64 => format!("extractUint64FromNode({})", expr),
            Primitive::UIntFast16 => format!(
                "std::uint_fast16_t(({}).As<Napi::Number>().Uint32Value())",
                expr
            ),
            // Going through a signed value keeps -1 (npos) intact.
            Primitive::Count => format!("size_t(({}).As<Napi::Number>().Int64Value())", expr),
            Primitive::Milliseconds => format!("std::chrono::milliseconds(extractInt64FromNode({}))", expr),
            Primitive::String | Primitive::StringView | Primitive::StringData => {
                self.string_to_native(expr)
            }
            Primitive::BinaryData | Primitive::OwnedBinaryData => format!(
                "([&] (const Napi::Value& v) -> {} {{\n\
                 auto buf = v.As<Napi::ArrayBuffer>();\n\
                 return BinaryData(static_cast<const char*>(buf.Data()), buf.ByteLength());\n\
                 }}({}))",
                primitive.cpp_name(),
                expr
            ),
            Primitive::EncryptionKey => format!(
                "([&] (const Napi::Value& v) {{\n\
                 auto buf = v.As<Napi::ArrayBuffer>();\n\
                 auto data = static_cast<const char*>(buf.Data());\n\
                 return std::vector<char>(data, data + buf.ByteLength());\n\
                 }}({}))",
                expr
            ),
            Primitive::ObjectId | Primitive::Uuid | Primitive::Decimal128 => format!(
                "{}(({}).ToString().Utf8Value().c_str())",
                primitive.cpp_name(),
                expr
            ),
            Primitive::EJson | Primitive::EJsonObj | Primitive::EJsonArray => self.string_to_native(
                &format!("{}.Call({{{}}})", self.ctor("EJSON_stringify"), expr),
            ),
            Primitive::BsonDocument | Primitive::BsonArray => format!(
                "{}(bson::parse({}))",
                primitive.cpp_name(),
                self.primitive_to_native(Primitive::EJsonObj, expr)?
            ),
            Primitive::Mixed
            | Primitive::QueryArg
            | Primitive::AppError
            | Primitive::ExceptionPtr
            | Primitive::ErrorCode
            | Primitive::Status => return None,
        })
    }

    fn null(&self) -> String {
        format!("{}.Null()", ENV)
    }

    fn undefined(&self) -> String {
        format!("{}.Undefined()", ENV)
    }

    fn is_null(&self, value: &str) -> String {
        format!("({}).IsNull()", value)
    }

    fn is_undefined(&self, value: &str) -> String {
        format!("({}).IsUndefined()", value)
    }

    fn is_array(&self, value: &str) -> String {
        format!("({}).IsArray()", value)
    }

    fn is_object(&self, value: &str) -> String {
        format!("({}).IsObject()", value)
    }

    fn is_function(&self, value: &str) -> String {
        format!("({}).IsFunction()", value)
    }

    fn new_array(&self) -> String {
        format!("Napi::Array::New({})", ENV)
    }

    fn array_push(&self, array: &str, item: &str) -> String {
        format!("{0}.Set({0}.Length(), {1});", array, item)
    }

    fn array_length(&self, array: &str) -> String {
        format!("({}).As<Napi::Array>().Length()", array)
    }

    fn array_get(&self, array: &str, index: &str) -> String {
        format!("({}).As<Napi::Array>().Get({})", array, index)
    }

    fn new_object(&self) -> String {
        format!("Napi::Object::New({})", ENV)
    }

    fn object_set(&self, object: &str, key: &str, value: &str) -> String {
        format!("{}.Set({}, {});", object, key, value)
    }

    fn object_get(&self, object: &str, key: &str) -> String {
        format!("({}).As<Napi::Object>().Get({})", object, key)
    }

    fn bind_function(&self, func: &str, this_value: &str) -> String {
        format!(
            "({0}).As<Napi::Function>().Get(\"bind\").As<Napi::Function>().Call({0}, {{{1}}})",
            func, this_value
        )
    }

    fn throw_error(&self, message: &str) -> String {
        format!("throw Napi::TypeError::New({}, \"{}\");", ENV, message)
    }

    fn opaque_to_managed(&self, cpp_type: &str, expr: &str) -> String {
        format!("Napi::External<{}>::New({}, &({}))", cpp_type, ENV, expr)
    }

    fn opaque_to_native(&self, cpp_type: &str, expr: &str) -> String {
        format!("(*({}).As<Napi::External<{}>>().Data())", expr, cpp_type)
    }

    fn map_entry_value(&self) -> String {
        "obj.Get(key)".to_string()
    }

    fn map_to_native(&self, map_type: &str, value: &str, expr: &str) -> String {
        format!(
            "[&] (const Napi::Value input) {{\n\
             auto obj = input.As<Napi::Object>();\n\
             auto out = {}();\n\
             const auto keys = obj.GetPropertyNames();\n\
             const uint32_t length = keys.Length();\n\
             for (uint32_t i = 0; i < length; i++) {{\n\
             auto key = keys.Get(i).As<Napi::String>().Utf8Value();\n\
             out.insert({{key, {}}});\n\
             }}\n\
             return out;\n\
             }}({})",
            map_type, value, expr
        )
    }

    fn callback_arg(&self, index: usize) -> String {
        format!("info[{}]", index)
    }

    fn func_to_managed(&self, call: &str, expr: &str) -> String {
        format!(
            "[&] (auto&& cb_in) -> Napi::Value {{\n\
             auto shared = std::make_shared<std::decay_t<decltype(cb_in)>>(FWD(cb_in));\n\
             return Napi::Function::New({env}, [shared] (const Napi::CallbackInfo& info) -> Napi::Value {{\n\
             auto& cb = *shared;\n\
             auto {env} = info.Env();\n\
             try {{\n\
             return {call};\n\
             }} catch (const std::exception& ex) {{\n\
             throwNodeException({env}, ex);\n\
             }}\n\
             BINDGEN_UNREACHABLE();\n\
             }});\n\
             }}({expr})",
            env = ENV,
            call = call,
            expr = expr
        )
    }

    fn callback_invoke(&self, args: &[String]) -> String {
        format!("_cb->Call({{{}}})", args.join(", "))
    }

    fn func_to_native(&self, expr: &str, params: &str, ret: &str, body: &str) -> String {
        format!(
            "[_cb = std::make_shared<Napi::FunctionReference>(Napi::Persistent(({expr}).As<Napi::Function>()))] ({params}) -> {ret} {{\n\
             auto {env} = _cb->Env();\n\
             Napi::HandleScope scope({env});\n\
             try {{\n\
             return {body};\n\
             }} catch (Napi::Error& e) {{\n\
             // Fill the message cache while a JS context is live so what() is safe later.\n\
             (void)e.what();\n\
             throw;\n\
             }}\n\
             }}",
            expr = expr,
            params = params,
            ret = ret,
            body = body,
            env = ENV
        )
    }

    fn env_param(&self) -> Option<CppVar> {
        Some(CppVar::new("Napi::Env", ENV))
    }

    fn env_from(&self, value: &str) -> String {
        format!("auto {} = ({}).Env();\n", ENV, value)
    }

    fn to_managed_helper(&self, name: &str, expr: &str) -> String {
        format!("{}({}, {})", name, ENV, expr)
    }
}

/// A native function exported to JS, checking for exactly `arg_count` arguments
fn exported_func(name: &str, arg_count: usize, body: &str) -> CppFunc {
    CppFunc::new(
        name,
        VALUE,
        vec![CppVar::new("const Napi::CallbackInfo&", "info")],
    )
    .body(format!(
        "auto {env} = info.Env();\n\
         if (info.Length() != {count}) {{\n\
         throw Napi::TypeError::New({env}, \"expected {count} arguments\");\n\
         }}\n\
         const auto callBlock = {addon}->startCall();\n\
         try {{\n\
         {body}\n\
         }} catch (const std::exception& ex) {{\n\
         throwNodeException({env}, ex);\n\
         }}\n\
         BINDGEN_UNREACHABLE();",
        env = ENV,
        count = arg_count,
        addon = addon(),
        body = body
    ))
}

/// Generator for the N-API native module
pub struct NodeGenerator<'a> {
    spec: &'a BoundSpec,
}

impl<'a> NodeGenerator<'a> {
    pub fn new(spec: &'a BoundSpec) -> Self {
        Self { spec }
    }

    /// Generate `node_init.cpp`, without the generated-file header
    pub fn generate(&self) -> Result<String> {
        let view = JsView::new(self.spec)?;
        let embedding = NodeEmbedding;
        let mut conv = Converter::new(&view, &embedding);

        let mut decls = CppDecls {
            static_asserts: enum_static_asserts(self.spec),
            ..CppDecls::default()
        };
        let mut exports: Vec<(String, String)> = Vec::new();

        for class in &view.classes {
            self.generate_class(class, &mut conv, &mut decls.free_funcs, &mut exports)?;
        }

        let mixed = self.mixed_helpers(&view, &mut conv)?;
        decls.free_funcs.extend(mixed);
        decls.free_funcs.extend(conv.into_struct_funcs());

        decls.free_funcs.push(
            CppFunc::new(
                "injectExternalTypes",
                VALUE,
                vec![CppVar::new("const Napi::CallbackInfo&", "info")],
            )
            .body(format!(
                "auto {env} = info.Env();\n\
                 {addon}->injectInjectables(info[0].As<Napi::Object>());\n\
                 return {env}.Undefined();",
                env = ENV,
                addon = addon()
            )),
        );
        exports.push(("injectInjectables".into(), "injectExternalTypes".into()));

        let mut init = format!("env.SetInstanceData(new {}());\n", ADDON_CLASS);
        for (name, func) in &exports {
            init.push_str(&format!(
                "exports.Set(\"{}\", Napi::Function::New(env, {}));\n",
                name, func
            ));
        }
        init.push_str("return exports;");
        decls.free_funcs.push(
            CppFunc::new(
                "node_init",
                "Napi::Object",
                vec![
                    CppVar::new("Napi::Env", "env"),
                    CppVar::new("Napi::Object", "exports"),
                ],
            )
            .body(init),
        );

        decls.classes.push(self.addon_class(&view));

        let mut output = String::new();
        for header in &self.spec.headers {
            output.push_str(&format!("#include <{}>\n", header));
        }
        output.push_str("#include <napi.h>\n");
        output.push_str(&format!("#include \"{}\"\n", helpers::COMMON_HEADER));
        output.push_str(&format!("#include \"{}\"\n\n", helpers::NODE_HEADER));
        output.push_str("namespace bindgen::node {\nnamespace {\n\n");
        output.push_str(&decls.render());
        output.push_str("\n} // namespace\n} // namespace bindgen::node\n\n");
        output.push_str("NODE_API_MODULE(bindgen_native, bindgen::node::node_init)\n");

        tracing::debug!(functions = exports.len(), "generated node module");
        Ok(output)
    }

    fn generate_class(
        &self,
        class: &JsClass<'_>,
        conv: &mut Converter<'_, '_, NodeEmbedding>,
        funcs: &mut Vec<CppFunc>,
        exports: &mut Vec<(String, String)>,
    ) -> Result<()> {
        let e = conv.embedding();
        let cast = HandleCast::for_class(self.spec, class.id);
        let raw = |expr: &str| format!("({}).As<Napi::External<{}>>().Data()", expr, cast.base);
        let site = cast.call_site(&raw("info[0]"));

        for method in class.methods.iter().filter(|m| m.opted_in) {
            let offset = usize::from(!method.is_static());
            let mut args = Vec::with_capacity(method.sig.args.len());
            for (i, arg) in method.sig.args.iter().enumerate() {
                args.push(conv.to_native(&arg.ty, &format!("info[{}]", i + offset))?);
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
                "auto& self = {self_expr};\n\
                 auto jsIt = Napi::Object::New({env});\n\
                 // The iterator borrows from the native object.\n\
                 jsIt.Set(\"_keepAlive\", info[0]);\n\
                 jsIt.Set(\"next\", Napi::Function::New({env}, \
                 [begin = std::make_move_iterator(self.begin()), end = std::make_move_iterator(self.end())] (const Napi::CallbackInfo& info) mutable {{\n\
                 auto {env} = info.Env();\n\
                 auto result = Napi::Object::New({env});\n\
                 if (begin == end) {{\n\
                 result.Set(\"done\", true);\n\
                 }} else {{\n\
                 result.Set(\"value\", {value});\n\
                 ++begin;\n\
                 }}\n\
                 return result;\n\
                 }}));\n\
                 return jsIt;",
                self_expr = site.self_expr,
                env = ENV,
                value = value
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
                format!("NODE_TO_{}_{}", kind, class.name),
                ref_type,
                vec![CppVar::new(VALUE, "val")],
            )
            .attributes("[[maybe_unused]]")
            .body(format!(
                "auto {env} = val.Env();\n\
                 auto external = {addon}->{extractor}.Call({{val}});\n\
                 const auto ptr = {ptr};\n\
                 {null_check}return *ptr;",
                env = ENV,
                addon = addon(),
                extractor = extractor_member(&class.js_name),
                ptr = cast.cast(&raw("external")),
                null_check = null_check
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
                    format!("NODE_FROM_{}_{}", kind, class.name),
                    VALUE,
                    vec![
                        CppVar::new("Napi::Env", ENV),
                        CppVar::new(cast.derived.as_str(), "val"),
                    ],
                )
                .attributes("[[maybe_unused]]")
                .body(format!(
                    "{assertion}auto external = Napi::External<{base}>::New({env}, {ptr}, [] (Napi::Env, {base}* ptr) {{\n\
                     delete {owned};\n\
                     }});\n\
                     return {addon}->{ctor}.New({{external}});",
                    assertion = assertion,
                    base = cast.base,
                    env = ENV,
                    ptr = cast.upcast("new auto(std::move(val))"),
                    owned = cast.cast("ptr"),
                    addon = addon(),
                    ctor = ctor_member(&class.js_name)
                )),
            );
        }

        tracing::debug!(class = %class.name, "generated node class bindings");
        Ok(())
    }

    fn mixed_helpers(
        &self,
        view: &JsView<'_>,
        conv: &mut Converter<'_, '_, NodeEmbedding>,
    ) -> Result<Vec<CppFunc>> {
        let info = &self.spec.mixed_info;

        let mut from = format!(
            "if (val.is_null()) {{\nreturn {}.Null();\n}}\nswitch (val.get_type()) {{\n",
            ENV
        );
        for getter in &info.getters {
            from.push_str(&format!(
                "case DataType::Type::{}:\nreturn {};\n",
                getter.data_type,
                conv.to_managed(&getter.ty, &format!("val.{}()", getter.getter))?
            ));
        }
        for unused in &info.unused_data_types {
            from.push_str(&format!("case DataType::Type::{}:\nbreak;\n", unused));
        }
        from.push_str("}\nBINDGEN_UNREACHABLE();");

        let mut instance_checks = String::new();
        for (ty, ctor) in mixed_instance_types(view) {
            instance_checks.push_str(&format!(
                "if (obj.InstanceOf({}->{}.Value())) {{\nreturn {};\n}}\n",
                addon(),
                ctor_member(&ctor),
                conv.to_native(&ty, "val")?
            ));
        }

        let binary = Type::Primitive(Primitive::BinaryData);
        let to = format!(
            "auto {env} = val.Env();\n\
             switch (val.Type()) {{\n\
             case napi_string:\n\
             return {string};\n\
             case napi_boolean:\n\
             return {boolean};\n\
             case napi_number:\n\
             return val.As<Napi::Number>().DoubleValue();\n\
             case napi_bigint:\n\
             return extractInt64FromNode(val);\n\
             case napi_null:\n\
             return Mixed();\n\
             case napi_object: {{\n\
             auto obj = val.As<Napi::Object>();\n\
             if (val.IsArrayBuffer()) {{\n\
             return {buffer};\n\
             }}\n\
             if (val.IsDataView()) {{\n\
             return {view};\n\
             }}\n\
             {checks}\
             const auto ctorName = obj.Get(\"constructor\").As<Napi::Object>().Get(\"name\").As<Napi::String>().Utf8Value();\n\
             throw Napi::TypeError::New({env}, \"Unable to convert an object with ctor '\" + ctorName + \"' to a Mixed\");\n\
             }}\n\
             default:\n\
             // undefined is not null here, otherwise std::optional<Mixed> would be ambiguous.\n\
             break;\n\
             }}\n\
             throw Napi::TypeError::New({env}, \"Can't convert \" + val.ToString().Utf8Value() + \" to Mixed\");",
            env = ENV,
            string = conv.to_native(&Type::Primitive(Primitive::StringData), "val")?,
            boolean = conv.to_native(&Type::Primitive(Primitive::Bool), "val")?,
            buffer = conv.to_native(&binary, "val")?,
            view = conv.to_native(&binary, "val.As<Napi::DataView>().ArrayBuffer()")?,
            checks = instance_checks
        );

        Ok(vec![
            CppFunc::new(
                "NODE_FROM_Mixed",
                VALUE,
                vec![CppVar::new("Napi::Env", ENV), CppVar::new("Mixed", "val")],
            )
            .body(from),
            CppFunc::new("NODE_TO_Mixed", "Mixed", vec![CppVar::new(VALUE, "val")]).body(to),
        ])
    }

    fn addon_class(&self, view: &JsView<'_>) -> CppClass {
        let mut addon = CppClass::new(ADDON_CLASS);
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

        let persistent = |member: &str, source: &str| {
            format!(
                "{} = Napi::Persistent({}.As<Napi::Function>());\n",
                member, source
            )
        };
        let mut inject = String::new();
        for name in INJECTABLES {
            // Int64 is a plain helper object; everything else is callable.
            if name == "Int64" {
                addon
                    .members
                    .push(CppVar::new("Napi::ObjectReference", ctor_member(name)));
                inject.push_str(&format!(
                    "{} = Napi::Persistent(args.Get(\"{}\").As<Napi::Object>());\n",
                    ctor_member(name),
                    name
                ));
                continue;
            }
            addon
                .members
                .push(CppVar::new("Napi::FunctionReference", ctor_member(name)));
            inject.push_str(&persistent(&ctor_member(name), &format!("args.Get(\"{}\")", name)));
        }
        for class in &view.classes {
            let ctor = ctor_member(&class.js_name);
            let extractor = extractor_member(&class.js_name);
            addon
                .members
                .push(CppVar::new("Napi::FunctionReference", ctor.as_str()));
            addon
                .members
                .push(CppVar::new("Napi::FunctionReference", extractor.as_str()));
            inject.push_str(&persistent(&ctor, &format!("args.Get(\"{}\")", class.js_name)));
            inject.push_str(&persistent(
                &extractor,
                &format!("{}.Value().Get(\"_extract\")", ctor),
            ));
        }
        addon.methods.push(
            CppFunc::new(
                "injectInjectables",
                "void",
                vec![CppVar::new("Napi::Object", "args")],
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

    fn generate(toml: &str) -> Result<String> {
        NodeGenerator::new(&bind(toml)).generate()
    }

    #[test]
    fn test_method_functions() {
        let out = generate(SPEC).unwrap();
        assert!(out.contains("Napi::Value Foo_bar(const Napi::CallbackInfo& info);"));
        assert!(out.contains("if (info.Length() != 2) {"));
        assert!(out.contains("throw Napi::TypeError::New(napi_env_var_ForBindGen, \"expected 2 arguments\");"));
        assert!(out.contains(
            "return Napi::Boolean::New(napi_env_var_ForBindGen, (**(info[0]).As<Napi::External<std::shared_ptr<Foo>>>().Data()).bar((info[1]).As<Napi::Number>().Int32Value()));"
        ));
        assert!(out.contains("exports.Set(\"Foo_bar\", Napi::Function::New(env, Foo_bar));"));
        assert!(out.contains("exports.Set(\"Foo_$addr\", Napi::Function::New(env, Foo__dollar_addr));"));
    }

    #[test]
    fn test_handles_are_finalized_externals() {
        let out = generate(SPEC).unwrap();
        assert!(out.contains(
            "auto external = Napi::External<Shape>::New(napi_env_var_ForBindGen, static_cast<Shape*>(new auto(std::move(val))), [] (Napi::Env, Shape* ptr) {\ndelete static_cast<Square*>(ptr);\n});"
        ));
        assert!(out.contains("return napi_env_var_ForBindGen.GetInstanceData<BindgenAddon>()->m_cls_Square_ctor.New({external});"));
        assert!(!out.contains("_deleter"));
        assert!(out.contains("Did you call $resetSharedPtr on it already?"));
        assert!(out.contains("jsIt.Set(\"_keepAlive\", info[0]);"));
    }

    #[test]
    fn test_async_completion_is_a_persistent_reference() {
        let out = generate(SPEC).unwrap();
        assert!(out.contains(
            "util::UniqueFunction<void(const EJson*, std::optional<AppError>)>([_cb = std::make_shared<Napi::FunctionReference>(Napi::Persistent((info[1]).As<Napi::Function>()))] (const EJson* result, std::optional<AppError> err) -> void {"
        ));
        assert!(!out.contains("AsyncCallback<"));
        assert!(out.contains("Napi::HandleScope scope(napi_env_var_ForBindGen);"));
    }

    #[test]
    fn test_callback_errors_cache_their_message() {
        let embedding = NodeEmbedding;
        let lambda = embedding.func_to_native("info[0]", "int32_t x", "void", "(void)_cb->Call({})");
        assert_eq!(
            lambda,
            "[_cb = std::make_shared<Napi::FunctionReference>(Napi::Persistent((info[0]).As<Napi::Function>()))] (int32_t x) -> void {\n\
             auto napi_env_var_ForBindGen = _cb->Env();\n\
             Napi::HandleScope scope(napi_env_var_ForBindGen);\n\
             try {\n\
             return (void)_cb->Call({});\n\
             } catch (Napi::Error& e) {\n\
             // Fill the message cache while a JS context is live so what() is safe later.\n\
             (void)e.what();\n\
             throw;\n\
             }\n\
             }"
        );
    }

    #[test]
    fn test_struct_helpers_take_the_env() {
        let out = generate(SPEC).unwrap();
        assert!(out.contains("Person STRUCT_FROM_NODE_Person(Napi::Value val) {\nauto napi_env_var_ForBindGen = (val).Env();"));
        assert!(out.contains("Person::name is required"));
        assert!(out.contains("NODE_FROM_Mixed(Napi::Env napi_env_var_ForBindGen, Mixed val);"));
    }

    #[test]
    fn test_module_registration() {
        let out = generate(SPEC).unwrap();
        assert!(out.contains("#include <napi.h>\n#include \"bindgen_helpers.h\"\n#include \"bindgen_node_helpers.h\"\n"));
        assert!(out.contains("env.SetInstanceData(new BindgenAddon());"));
        assert!(out.contains("exports.Set(\"injectInjectables\", Napi::Function::New(env, injectExternalTypes));"));
        assert!(out.contains("m_cls_Foo_extractor = Napi::Persistent(m_cls_Foo_ctor.Value().Get(\"_extract\").As<Napi::Function>());"));
        assert!(out.contains("m_cls_Int64_ctor = Napi::Persistent(args.Get(\"Int64\").As<Napi::Object>());"));
        assert!(out.contains("m_cls_ArrayBuffer_ctor = Napi::Persistent(args.Get(\"ArrayBuffer\").As<Napi::Function>());"));
        assert!(out.trim_end().ends_with("NODE_API_MODULE(bindgen_native, bindgen::node::node_init)"));
    }
}
