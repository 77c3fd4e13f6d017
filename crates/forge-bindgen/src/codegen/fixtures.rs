//! Shared spec used by the emitter tests

use crate::model::{bind_model, BoundSpec};
use crate::spec::RawSpec;

/// A shared-pointer class `Foo` with a plain and an async method, an
/// abstract iterable `Shape` with a subclass, a record and an enum
pub const SPEC: &str = r#"
headers = ["foo/foo.hpp"]
primitives = ["void", "bool", "int32_t", "double", "std::string", "StringData", "BinaryData",
  "Mixed", "AppError", "EJson"]

[templates]
"std::optional" = 1
"std::shared_ptr" = 1
"std::vector" = 1
"std::map" = 2
"AsyncCallback" = 1

[mixedInfo]
unusedDataTypes = ["Link"]

[mixedInfo.dataTypes.Int]
type = "int32_t"
getter = "get_int"

[enums.Color]
values = ["Red", "Green"]

[records.Person.fields]
name = "std::string"

[classes.Foo]
sharedPtrWrapped = "SharedFoo"

[classes.Foo.methods]
bar = "(x: int32_t) -> bool"
connect = "(cb: AsyncCallback<(result: const EJson*, err: std::optional<AppError>)>)"

[classes.Shape]
abstract = true
iterable = "int32_t"

[classes.Square]
base = "Shape"

[classes.Square.properties]
side = "double"

[classes.Square.staticMethods]
make = "(owner: const Person&) -> Square"
"#;

pub fn bind(toml: &str) -> BoundSpec {
    let raw = RawSpec::from_toml(toml).unwrap();
    bind_model(&raw, None).unwrap()
}
