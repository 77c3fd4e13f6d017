//! Wrapper modules around the flat native function table
//!
//! Each class becomes a JavaScript class holding its native handle under a
//! module-private symbol owned by the root of its hierarchy. Methods look up
//! their native function once at module load, and async methods are adapted
//! to promises through `_promisify`.

use super::{is_constructible, INJECTABLES};
use crate::error::Result;
use crate::model::BoundSpec;
use crate::passes::{JsClass, JsView};

/// Which native module the wrapper loads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperFlavor {
    /// N-API addon loaded with `require`
    Node,
    /// Emscripten module; instances are released by a `FinalizationRegistry`
    Wasm,
}

impl WrapperFlavor {
    pub fn file_name(self) -> &'static str {
        match self {
            WrapperFlavor::Node => "native.node.ts",
            WrapperFlavor::Wasm => "native.wasm.ts",
        }
    }

    fn prelude(self) -> &'static str {
        match self {
            WrapperFlavor::Node => {
                "import { createRequire } from \"node:module\";\n\
                 import { ObjectId, UUID, Decimal128, EJSON } from \"bson\";\n\
                 import { Float, Status } from \"./core\";\n\n\
                 export * from \"./core\";\n\n\
                 const nativeModule = createRequire(import.meta.url)(\"./bindgen_native.node\");\n"
            }
            WrapperFlavor::Wasm => {
                "import { ObjectId, UUID, Decimal128, EJSON } from \"bson\";\n\
                 import { Float, Status } from \"./core\";\n\
                 import loadModule from \"./bindgen_native.mjs\";\n\n\
                 export * from \"./core\";\n\n\
                 const nativeModule = await loadModule();\n\
                 nativeModule.wasmInit();\n\n\
                 const _registry = new FinalizationRegistry(([deleter, ptr]) => deleter(ptr));\n"
            }
        }
    }
}

const PROMISIFY: &str = "\
function _promisify(nullAllowed, func) {
  return new Promise((resolve, reject) => {
    func((...cbargs) => {
      // Errors raised here belong to the promise, not to the native caller.
      try {
        if (cbargs.length < 1 || cbargs.length > 2) throw Error(\"invalid cbargs length \" + cbargs.length);
        const error = cbargs[cbargs.length - 1];
        if (error) {
          reject(error);
        } else if (cbargs.length == 2) {
          const result = cbargs[0];
          if (!nullAllowed && (result === null || result === undefined)) {
            throw new Error(\"Unexpected null or undefined successful result\");
          }
          resolve(result);
        } else {
          resolve();
        }
      } catch (err) {
        reject(err);
      }
    });
  });
}
";

const INT64: &str = "\
export const Int64 = Object.freeze({
  add(a, b) { return a + b; },
  // == so that number and string right-hand sides compare too
  equals(a, b) { return a == b; },
  isInt(a) { return typeof a === \"bigint\"; },
  numToInt(a) { return BigInt(a); },
  strToInt(a) { return BigInt(a); },
  intToNum(a) { return Number(a); },
});
";

/// Generator for `native.node.ts` and `native.wasm.ts`
pub struct WrapperGenerator<'a> {
    spec: &'a BoundSpec,
    flavor: WrapperFlavor,
}

impl<'a> WrapperGenerator<'a> {
    pub fn new(spec: &'a BoundSpec, flavor: WrapperFlavor) -> Self {
        Self { spec, flavor }
    }

    pub fn generate(&self) -> Result<String> {
        let view = JsView::new(self.spec)?;
        let mut output = String::from("// @ts-nocheck\n");
        output.push_str(self.flavor.prelude());
        output.push('\n');
        output.push_str(PROMISIFY);
        output.push('\n');
        output.push_str(INT64);

        for class in &view.classes {
            output.push('\n');
            output.push_str(&self.class(&view, class)?);
        }

        let mut injectables: Vec<String> = INJECTABLES
            .iter()
            .map(|name| match *name {
                "EJSON_parse" => "EJSON_parse: EJSON.parse".to_string(),
                "EJSON_stringify" => "EJSON_stringify: EJSON.stringify".to_string(),
                other => other.to_string(),
            })
            .collect();
        injectables.extend(view.classes.iter().map(|c| c.js_name.clone()));
        output.push_str(&format!(
            "\nnativeModule.injectInjectables({{ {} }});\n",
            injectables.join(", ")
        ));

        tracing::debug!(flavor = ?self.flavor, classes = view.classes.len(), "generated wrapper");
        Ok(output)
    }

    fn class(&self, view: &JsView<'_>, class: &JsClass<'_>) -> Result<String> {
        let mut out = String::new();
        // Always read through this binding so engines can rely on it never changing.
        let symbol = format!("_{}_Symbol", view.handle_owner_name(class.id));
        let mut body: Vec<String> = Vec::new();

        if class.base.is_none() {
            out.push_str(&format!(
                "const {} = Symbol(\"Bindgen.{}.external_pointer\");\n",
                symbol, class.js_name
            ));
            let register = match self.flavor {
                WrapperFlavor::Node => String::new(),
                WrapperFlavor::Wasm => "\n    const deleter = new.target._deleter;\n    \
                     if (deleter) _registry.register(this, [deleter, ptr]);"
                    .to_string(),
            };
            body.push(format!(
                "  constructor(ptr) {{\n    this[{}] = ptr;{}\n  }}",
                symbol, register
            ));
        }

        // Subclasses override this with a more specific check.
        body.push(format!(
            "  static _extract(self) {{\n    \
             if (!(self instanceof {name})) throw new TypeError(\"Expected a {name}\");\n    \
             const out = self[{symbol}];\n    \
             if (!out) throw new TypeError(\"Received an improperly constructed {name}\");\n    \
             return out;\n  \
             }}",
            name = class.js_name,
            symbol = symbol
        ));

        for method in class.methods.iter().filter(|m| m.opted_in) {
            let native = format!("_native_{}", method.id());
            out.push_str(&format!("const {} = nativeModule.{};\n", native, method.id()));

            let params: Vec<&str> = method.surface_sig().args.iter().map(|a| a.name.as_str()).collect();
            let mut args: Vec<String> = Vec::with_capacity(params.len() + 2);
            if !method.is_static() {
                args.push(format!("this[{}]", symbol));
            }
            args.extend(params.iter().map(|p| p.to_string()));
            let call = match &method.async_transform {
                Some(transform) => {
                    args.push("_cb".to_string());
                    format!(
                        "_promisify({}, (_cb) => {}({}))",
                        transform.null_allowed,
                        native,
                        args.join(", ")
                    )
                }
                None => format!("{}({})", native, args.join(", ")),
            };

            let prefix = match (method.is_static(), method.is_property()) {
                (true, _) => "static ",
                (false, true) => "get ",
                (false, false) => "",
            };
            body.push(format!(
                "  {}{}({}) {{\n    return {};\n  }}",
                prefix,
                method.js_name,
                params.join(", "),
                call
            ));
        }

        if class.iterable.is_some() {
            let id = class.iterator_method_id();
            out.push_str(&format!("const _native_{0} = nativeModule.{0};\n", id));
            body.push(format!(
                "  [Symbol.iterator]() {{\n    return _native_{}(this[{}]);\n  }}",
                id, symbol
            ));
        }

        if self.flavor == WrapperFlavor::Wasm && is_constructible(class) {
            let deleter = format!("{}_deleter", class.name);
            out.push_str(&format!("const _native_{0} = nativeModule.{0};\n", deleter));
            body.push(format!("  static _deleter = _native_{};", deleter));
        }

        let extends = class
            .base
            .map(|base| format!(" extends {}", view.class(base).js_name))
            .unwrap_or_default();
        out.push_str(&format!(
            "export class {}{} {{\n{}\n}}\n",
            class.js_name,
            extends,
            body.join("\n\n")
        ));
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

    fn generate(flavor: WrapperFlavor) -> String {
        WrapperGenerator::new(&bind(SPEC), flavor).generate().unwrap()
    }

    #[test]
    fn test_methods_call_cached_native_functions() {
        let out = generate(WrapperFlavor::Node);
        assert!(out.starts_with("// @ts-nocheck\n"));
        assert!(out.contains("const _native_Foo_bar = nativeModule.Foo_bar;\n"));
        assert!(out.contains("  bar(x) {\n    return _native_Foo_bar(this[_Foo_Symbol], x);\n  }"));
        assert!(out.contains("  $resetSharedPtr() {\n    return _native_Foo_$resetSharedPtr(this[_Foo_Symbol]);\n  }"));
        assert!(out.contains("const _Foo_Symbol = Symbol(\"Bindgen.Foo.external_pointer\");"));
    }

    #[test]
    fn test_async_methods_are_promisified() {
        let out = generate(WrapperFlavor::Node);
        assert!(out.contains(
            "  connect() {\n    return _promisify(true, (_cb) => _native_Foo_connect(this[_Foo_Symbol], _cb));\n  }"
        ));
        assert!(out.contains("function _promisify(nullAllowed, func) {"));
        assert!(out.contains("if (!nullAllowed && (result === null || result === undefined)) {"));
    }

    #[test]
    fn test_promisify_settles_by_callback_shape() {
        let out = generate(WrapperFlavor::Wasm);
        assert!(out.contains(PROMISIFY));
        assert!(out.contains(
            "        if (error) {\n          reject(error);\n        } else if (cbargs.length == 2) {"
        ));
        assert!(out.contains(
            "          if (!nullAllowed && (result === null || result === undefined)) {\n            \
             throw new Error(\"Unexpected null or undefined successful result\");\n          }\n          \
             resolve(result);"
        ));
        assert!(out.contains("        } else {\n          resolve();\n        }"));
        assert!(out.contains("      } catch (err) {\n        reject(err);\n      }"));
        assert_eq!(out.matches("function _promisify(").count(), 1);
    }

    #[test]
    fn test_promisify_null_policy_follows_the_completion_value() {
        let toml = SPEC.replace(
            "connect = ",
            "refresh = \"(cb: AsyncCallback<(err: std::optional<AppError>)>)\"\n\
             fetch = \"(key: int32_t, cb: AsyncCallback<(name: const std::string&, err: std::optional<AppError>)>)\"\n\
             connect = ",
        );
        let out = WrapperGenerator::new(&bind(&toml), WrapperFlavor::Node).generate().unwrap();
        assert!(out.contains(
            "  refresh() {\n    return _promisify(false, (_cb) => _native_Foo_refresh(this[_Foo_Symbol], _cb));\n  }"
        ));
        assert!(out.contains(
            "  fetch(key) {\n    return _promisify(false, (_cb) => _native_Foo_fetch(this[_Foo_Symbol], key, _cb));\n  }"
        ));
        assert!(out.contains(
            "  connect() {\n    return _promisify(true, (_cb) => _native_Foo_connect(this[_Foo_Symbol], _cb));\n  }"
        ));
    }

    #[test]
    fn test_subclasses_share_the_root_symbol() {
        let out = generate(WrapperFlavor::Node);
        assert!(out.contains("export class Square extends Shape {"));
        assert!(!out.contains("_Square_Symbol"));
        assert!(out.contains("  get side() {\n    return _native_Square_side(this[_Shape_Symbol]);\n  }"));
        assert!(out.contains("  static make(owner) {\n    return _native_Square_make(owner);\n  }"));
        assert!(out.contains("if (!(self instanceof Square)) throw new TypeError(\"Expected a Square\");"));
        assert!(out.contains("  [Symbol.iterator]() {\n    return _native_Shape_Symbol_iterator(this[_Shape_Symbol]);\n  }"));
    }

    #[test]
    fn test_injectables() {
        let out = generate(WrapperFlavor::Node);
        assert!(out.contains(
            "nativeModule.injectInjectables({ Int64, ArrayBuffer, Float, Status, UUID, ObjectId, Decimal128, EJSON_parse: EJSON.parse, EJSON_stringify: EJSON.stringify, Foo, Shape, Square });"
        ));
        assert!(!out.contains("_registry"));
    }

    #[test]
    fn test_wasm_registers_deleters() {
        let out = generate(WrapperFlavor::Wasm);
        assert!(out.contains("nativeModule.wasmInit();"));
        assert!(out.contains("const _registry = new FinalizationRegistry(([deleter, ptr]) => deleter(ptr));"));
        assert!(out.contains("if (deleter) _registry.register(this, [deleter, ptr]);"));
        assert!(out.contains("  static _deleter = _native_Square_deleter;"));
        assert!(out.contains("  static _deleter = _native_Foo_deleter;"));
        assert!(!out.contains("Shape_deleter"));
    }

    #[test]
    fn test_opted_out_methods_have_no_binding() {
        let raw = RawSpec::from_toml(SPEC).unwrap();
        let opt_in = OptInSpec::from_toml("[classes.Foo]\nmethods = [\"bar\"]\n").unwrap();
        let spec = bind_model(&raw, Some(&opt_in)).unwrap();
        let out = WrapperGenerator::new(&spec, WrapperFlavor::Node).generate().unwrap();
        assert!(out.contains("_native_Foo_bar"));
        assert!(!out.contains("Foo_connect"));
        assert!(!out.contains("Square_make"));
    }

    #[test]
    fn test_wrappers_parse() {
        for flavor in [WrapperFlavor::Node, WrapperFlavor::Wasm] {
            check_typescript(&generate(flavor), "file:///native.ts").unwrap();
        }
    }
}
