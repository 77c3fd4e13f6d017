//! TypeScript outputs: `core.ts` and `native.d.ts`
//!
//! `core.ts` holds the runtime values shared by every wrapper (const enums,
//! `Float`, `Status`); `native.d.ts` declares the wrapper classes. Members
//! that are not opted in are still declared, marked `@deprecated`.

use crate::error::{BindgenError, Result};
use crate::model::{BoundSpec, Func, Primitive, Template, TemplateKind, Type};
use crate::passes::{JsClass, JsRecord, JsView};

/// Which way a value crosses the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    /// Managed to native
    Argument,
    /// Native to managed
    Return,
}

impl Kind {
    fn inverted(self) -> Self {
        match self {
            Kind::Argument => Kind::Return,
            Kind::Return => Kind::Argument,
        }
    }

    /// Arguments accept the relaxed form of records
    fn suffix(self) -> &'static str {
        match self {
            Kind::Argument => "_Relaxed",
            Kind::Return => "",
        }
    }
}

fn primitive_type(primitive: Primitive, kind: Kind) -> &'static str {
    match primitive {
        Primitive::Void => "void",
        Primitive::Bool => "boolean",
        Primitive::Double | Primitive::Int32 | Primitive::Count | Primitive::UIntFast16 => "number",
        Primitive::Float => "Float",
        Primitive::Int64 | Primitive::UInt64 | Primitive::Milliseconds => "Int64",
        Primitive::String | Primitive::StringView | Primitive::StringData => "string",
        Primitive::BinaryData | Primitive::OwnedBinaryData | Primitive::EncryptionKey => {
            "ArrayBuffer"
        }
        Primitive::ObjectId => "ObjectId",
        Primitive::Uuid => "UUID",
        Primitive::Decimal128 => "Decimal128",
        Primitive::Mixed => match kind {
            Kind::Argument => "MixedArg",
            Kind::Return => "Mixed",
        },
        Primitive::QueryArg => "(MixedArg | MixedArg[])",
        Primitive::AppError => "AppError",
        Primitive::ExceptionPtr => "Error",
        Primitive::ErrorCode => "CppErrorCode",
        Primitive::Status => "Status",
        Primitive::EJson => "EJson",
        Primitive::EJsonArray | Primitive::BsonArray => "EJson[]",
        Primitive::EJsonObj | Primitive::BsonDocument => "Record<string, EJson>",
    }
}

/// TypeScript spelling of `ty`
///
/// Every mapping applies to the whole type, so `T[]` is never produced for
/// an argument that may be a union.
fn ts_type(view: &JsView<'_>, ty: &Type, kind: Kind) -> Result<String> {
    Ok(match ty {
        Type::Pointer(inner) | Type::Ref(inner) | Type::RRef(inner) => {
            ts_type(view, inner, kind)?
        }
        Type::Const(inner) => format!("Readonly<{}>", ts_type(view, inner, kind)?),
        Type::KeyType(_) | Type::Opaque(_) | Type::Enum(_) | Type::Class(_) => {
            view.named_type(ty).unwrap_or_default()
        }
        Type::Struct(id) => format!("{}{}", view.record(*id).js_name, kind.suffix()),
        Type::Primitive(p) => primitive_type(*p, kind).to_string(),
        Type::Template(t) => template_type(view, t, kind)?,
        Type::Func(func) => func_type(view, func, kind)?,
    })
}

fn template_type(view: &JsView<'_>, template: &Template, kind: Kind) -> Result<String> {
    let args = template
        .args
        .iter()
        .map(|arg| ts_type(view, arg, kind))
        .collect::<Result<Vec<_>>>()?;
    let undeclarable = |reason: &str| BindgenError::Undeclarable {
        ty: view.spec.describe(&Type::Template(template.clone())),
        reason: reason.to_string(),
    };

    Ok(match template.kind {
        TemplateKind::Vector => format!("Array<{}>", args[0]),
        TemplateKind::Optional => format!("undefined | {}", args[0]),
        TemplateKind::Nullable => format!("null | {}", args[0]),
        TemplateKind::SharedPtr | TemplateKind::UniqueFunction | TemplateKind::Function => {
            args[0].clone()
        }
        TemplateKind::Pair | TemplateKind::Tuple => format!("[{}]", args.join(", ")),
        TemplateKind::Map | TemplateKind::UnorderedMap => {
            format!("Record<{}, {}>", args[0], args[1])
        }
        TemplateKind::AsyncResult => format!("Promise<{}>", args[0]),
        TemplateKind::AsyncCallback => {
            return Err(undeclarable(
                "the completion callback is not the last argument of a void method",
            ))
        }
        TemplateKind::IgnoreArgument => {
            return Err(undeclarable("ignored arguments have no managed type"))
        }
    })
}

fn func_type(view: &JsView<'_>, func: &Func, kind: Kind) -> Result<String> {
    // A callback's arguments flow the other way from its return value.
    let mut args = Vec::new();
    for arg in func.args_skipping_ignored() {
        args.push(format!("{}: {}", arg.name, ts_type(view, &arg.ty, kind.inverted())?));
    }
    Ok(format!(
        "(({}) => {})",
        args.join(", "),
        ts_type(view, &func.ret, kind)?
    ))
}

fn arguments(view: &JsView<'_>, func: &Func) -> Result<String> {
    let mut args = Vec::with_capacity(func.args.len());
    for arg in &func.args {
        args.push(format!("{}: {}", arg.name, ts_type(view, &arg.ty, Kind::Argument)?));
    }
    Ok(args.join(", "))
}

/// Generator for `core.ts`
pub struct CoreGenerator<'a> {
    spec: &'a BoundSpec,
}

impl<'a> CoreGenerator<'a> {
    pub fn new(spec: &'a BoundSpec) -> Self {
        Self { spec }
    }

    pub fn generate(&self) -> Result<String> {
        let view = JsView::new(self.spec)?;
        let mut output = String::new();

        output.push_str("// Enums\n");
        for e in &view.enums {
            // const enums need no runtime backing.
            output.push_str(&format!("export const enum {} {{\n", e.js_name));
            for enumerator in &e.enumerators {
                output.push_str(&format!("  {} = {},\n", enumerator.js_name, enumerator.value));
            }
            output.push_str("}\n\n");
        }

        output.push_str(
            "// Wrapped types\n\
             export class Float {\n\
             \x20 constructor(public value: number) {}\n\
             \x20 valueOf() {\n\
             \x20   return this.value;\n\
             \x20 }\n\
             }\n\n\
             export class Status extends Error {\n\
             \x20 constructor(public code: number, reason: string) {\n\
             \x20   super(reason);\n\
             \x20 }\n\
             }\n",
        );

        tracing::debug!(enums = view.enums.len(), "generated core.ts");
        Ok(output)
    }
}

/// Generator for `native.d.ts`
pub struct DeclarationGenerator<'a> {
    spec: &'a BoundSpec,
}

impl<'a> DeclarationGenerator<'a> {
    pub fn new(spec: &'a BoundSpec) -> Self {
        Self { spec }
    }

    pub fn generate(&self) -> Result<String> {
        let view = JsView::new(self.spec)?;
        let mut output = String::new();

        output.push_str("import { ObjectId, UUID, Decimal128 } from \"bson\";\n");
        let mut core_names = vec!["Float".to_string(), "Status".to_string()];
        core_names.extend(view.enums.iter().map(|e| e.js_name.clone()));
        output.push_str(&format!(
            "import {{ {} }} from \"./core\";\n\n",
            core_names.join(", ")
        ));
        output.push_str("export * from \"./core\";\n\n");

        output.push_str(
            "// Utilities\n\
             export type AppError = Error & { code: number };\n\
             export type CppErrorCode = Error & { code: number; category: string };\n\n\
             export const enum Int64Type {}\n\
             export type Int64 = Int64Type;\n\
             export declare const Int64: {\n\
             \x20 add(a: Int64, b: Int64): Int64;\n\
             \x20 equals(a: Int64, b: Int64 | number | string): boolean;\n\
             \x20 isInt(a: unknown): a is Int64;\n\
             \x20 numToInt(a: number): Int64;\n\
             \x20 strToInt(a: string): Int64;\n\
             \x20 intToNum(a: Int64): number;\n\
             };\n\n",
        );

        output.push_str("// Mixed types\n");
        output.push_str(&self.mixed_types(&view)?);
        output.push_str(
            "export type EJson = null | string | number | boolean | EJson[] | { [name: string]: EJson };\n\n",
        );

        output.push_str("// Opaque types (including key types)\n");
        let opaque_names = self
            .spec
            .opaque_types
            .iter()
            .map(|o| view.named_type(&Type::Opaque(o.id)))
            .chain(
                self.spec
                    .key_types
                    .iter()
                    .map(|k| view.named_type(&Type::KeyType(k.id))),
            )
            .flatten();
        for name in opaque_names {
            output.push_str("/** Using an empty enum to express a nominal type */\n");
            output.push_str(&format!("export enum {} {{}}\n", name));
        }
        output.push('\n');

        output.push_str("// Records\n");
        for record in &view.records {
            output.push_str(&self.record(&view, record, Kind::Return)?);
            output.push_str(&self.record(&view, record, Kind::Argument)?);
        }

        output.push_str("// Classes\n");
        for class in &view.classes {
            output.push_str(&self.class(&view, class)?);
        }

        tracing::debug!(
            classes = view.classes.len(),
            records = view.records.len(),
            "generated native.d.ts"
        );
        Ok(output)
    }

    fn mixed_types(&self, view: &JsView<'_>) -> Result<String> {
        let info = &self.spec.mixed_info;
        let mut getters = vec!["null".to_string()];
        for getter in &info.getters {
            let ty = ts_type(view, &getter.ty, Kind::Return)?;
            if !getters.contains(&ty) {
                getters.push(ty);
            }
        }
        let mut ctors = vec!["null".to_string()];
        for ctor in &info.ctors {
            let ty = ts_type(view, ctor, Kind::Argument)?;
            if !ctors.contains(&ty) {
                ctors.push(ty);
            }
        }
        Ok(format!(
            "export type Mixed = {};\nexport type MixedArg = {};\n",
            getters.join(" | "),
            ctors.join(" | ")
        ))
    }

    fn record(&self, view: &JsView<'_>, record: &JsRecord<'_>, kind: Kind) -> Result<String> {
        let name = format!("{}{}", record.js_name, kind.suffix());
        // Function fields only exist on the way in.
        let fields: Vec<_> = record
            .fields
            .iter()
            .filter(|f| kind == Kind::Argument || !f.field.ty.is_function())
            .collect();
        if fields.is_empty() {
            return Ok(format!("export type {} = Record<string, never>;\n\n", name));
        }

        let mut out = format!("export type {} = {{\n", name);
        for field in fields {
            if !field.field.opted_in {
                out.push_str(&format!(
                    "  /** @deprecated Add '{}' to your opt-in list (under [records.{}] fields) to use this. */\n",
                    field.field.name, record.record.name
                ));
            }
            if let Some(default) = field
                .field
                .default
                .as_deref()
                .filter(|d| !matches!(*d, "" | "{}" | "[]"))
            {
                out.push_str(&format!("  /** @default {} */\n", default));
            }
            let optional = kind == Kind::Argument && !field.field.required;
            out.push_str(&format!(
                "  {}{}: {};\n",
                field.js_name,
                if optional { "?" } else { "" },
                ts_type(view, &field.field.ty, kind)?
            ));
        }
        out.push_str("};\n\n");
        Ok(out)
    }

    fn class(&self, view: &JsView<'_>, class: &JsClass<'_>) -> Result<String> {
        let extends = class
            .base
            .map(|base| format!(" extends {}", view.class(base).js_name))
            .unwrap_or_default();
        let mut out = format!("export declare class {}{} {{\n", class.js_name, extends);
        out.push_str(&format!("  private brandFor{};\n", class.js_name));
        let visibility = if class.subclasses.is_empty() {
            "private"
        } else {
            "protected"
        };
        out.push_str(&format!("  {} constructor();\n", visibility));

        for method in &class.methods {
            if !method.opted_in {
                out.push_str(&format!(
                    "  /** @deprecated Add '{}' to your opt-in list (under [classes.{}] methods) to use this. */\n",
                    method.unique_name, class.name
                ));
            }
            if method.is_property() {
                out.push_str(&format!(
                    "  readonly {}: {};\n",
                    method.js_name,
                    ts_type(view, &method.sig.ret, Kind::Return)?
                ));
                continue;
            }
            let sig = method.surface_sig();
            out.push_str(&format!(
                "  {}{}({}): {};\n",
                if method.is_static() { "static " } else { "" },
                method.js_name,
                arguments(view, sig)?,
                ts_type(view, &sig.ret, Kind::Return)?
            ));
        }

        if let Some(item) = &class.iterable {
            out.push_str(&format!(
                "  [Symbol.iterator](): Iterator<{}>;\n",
                ts_type(view, item, Kind::Return)?
            ));
        }
        out.push_str("}\n\n");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::syntax::check_typescript;
    use crate::codegen::fixtures::{bind, SPEC};
    use crate::model::bind_model;
    use crate::spec::{OptInSpec, RawSpec};
    use pretty_assertions::assert_eq;

    fn declarations(toml: &str) -> Result<String> {
        DeclarationGenerator::new(&bind(toml)).generate()
    }

    #[test]
    fn test_core_enums_and_wrapped_types() {
        let out = CoreGenerator::new(&bind(SPEC)).generate().unwrap();
        assert!(out.contains("export const enum Color {\n  Red = 0,\n  Green = 1,\n}"));
        assert!(out.contains("export class Float {"));
        assert!(out.contains("export class Status extends Error {"));
        check_typescript(&out, "file:///core.ts").unwrap();
    }

    #[test]
    fn test_class_declarations() {
        let out = declarations(SPEC).unwrap();
        assert!(out.contains("export declare class Foo {\n  private brandForFoo;\n  private constructor();\n  bar(x: number): boolean;\n"));
        assert!(out.contains("  $addr(): number;\n  $resetSharedPtr(): void;\n"));
        assert!(out.contains("export declare class Shape {\n  private brandForShape;\n  protected constructor();\n"));
        assert!(out.contains("  [Symbol.iterator](): Iterator<number>;\n"));
        assert!(out.contains("export declare class Square extends Shape {"));
        assert!(out.contains("  readonly side: number;\n"));
        assert!(out.contains("  static make(owner: Readonly<Person_Relaxed>): Square;\n"));
    }

    #[test]
    fn test_async_methods_return_promises() {
        let out = declarations(SPEC).unwrap();
        assert!(out.contains("  connect(): Promise<Readonly<EJson>>;\n"));
    }

    #[test]
    fn test_records_and_mixed() {
        let out = declarations(SPEC).unwrap();
        assert!(out.contains("export type Person = {\n  name: string;\n};"));
        assert!(out.contains("export type Person_Relaxed = {\n  name: string;\n};"));
        assert!(out.contains("export type Mixed = null | number;"));
        assert!(out.contains("import { Float, Status, Color } from \"./core\";"));
    }

    #[test]
    fn test_records_relax_optional_fields() {
        let toml = "primitives = [\"void\", \"int32_t\", \"std::string\"]\n\
                    templates = { \"std::optional\" = 1, \"std::function\" = 1 }\n\
                    [mixedInfo]\n\
                    [records.Config.fields]\n\
                    path = \"std::string\"\n\
                    retries = { type = \"int32_t\", default = \"3\" }\n\
                    label = { type = \"std::optional<std::string>\" }\n\
                    on_done = \"std::function<(code: int32_t) -> void>\"\n";
        let out = declarations(toml).unwrap();
        assert!(out.contains(
            "export type Config = {\n  path: string;\n  /** @default 3 */\n  retries: number;\n  label: undefined | string;\n};"
        ));
        assert!(out.contains("  retries?: number;\n"));
        assert!(out.contains("  label?: undefined | string;\n"));
        assert!(out.contains("  onDone: ((code: number) => void);\n"));
    }

    #[test]
    fn test_opted_out_members_are_deprecated() {
        let raw = RawSpec::from_toml(SPEC).unwrap();
        let opt_in = OptInSpec::from_toml("[classes.Foo]\nmethods = [\"bar\"]\n").unwrap();
        let spec = bind_model(&raw, Some(&opt_in)).unwrap();
        let out = DeclarationGenerator::new(&spec).generate().unwrap();

        assert!(out.contains(
            "  /** @deprecated Add 'connect' to your opt-in list (under [classes.Foo] methods) to use this. */\n  connect(): Promise<Readonly<EJson>>;\n"
        ));
        assert!(!out.contains("Add 'bar'"));
        assert!(out.contains("Add 'name' to your opt-in list (under [records.Person] fields)"));
    }

    #[test]
    fn test_misplaced_completion_callback_is_undeclarable() {
        let toml = format!(
            "{}\n[classes.Bad.methods]\nstart = \"(cb: AsyncCallback<(err: std::optional<AppError>) -> void>, x: int32_t) -> void\"\n",
            SPEC
        );
        assert!(matches!(
            declarations(&toml),
            Err(BindgenError::Undeclarable { .. })
        ));
    }

    #[test]
    fn test_declarations_parse() {
        let out = declarations(SPEC).unwrap();
        check_typescript(&out, "file:///native.d.ts").unwrap();
        assert_eq!(out, declarations(SPEC).unwrap());
    }
}
