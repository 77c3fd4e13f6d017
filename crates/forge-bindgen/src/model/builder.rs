//! Builds a [`BoundSpec`] from a [`RawSpec`]

use super::*;
use crate::spec::{Arity, ClassSpec, FunctionSpec, MethodSpec, OptInSpec, RawSpec, TypeSpec};
use std::collections::HashSet;

struct Binder<'a> {
    raw: &'a RawSpec,
    templates: IndexMap<String, TemplateKind>,
    types: IndexMap<String, Type>,
}

impl<'a> Binder<'a> {
    fn add_type(&mut self, name: &str, ty: Type) -> Result<()> {
        if self.types.contains_key(name) {
            return Err(BindgenError::DuplicateType(name.to_string()));
        }
        self.types.insert(name.to_string(), ty);
        Ok(())
    }

    fn add_named_type(&mut self, name: &str, ty: Type) -> Result<()> {
        if name.contains('_') {
            return Err(BindgenError::InvalidTypeName(name.to_string()));
        }
        self.add_type(name, ty)
    }

    fn resolve(&self, spec: &TypeSpec, context: &str) -> Result<Type> {
        Ok(match spec {
            TypeSpec::Name(name) => self
                .types
                .get(name)
                .cloned()
                .ok_or_else(|| BindgenError::UnknownType(name.clone()))?,
            TypeSpec::Template { name, args } => {
                let kind = *self
                    .templates
                    .get(name)
                    .ok_or_else(|| BindgenError::UnknownTemplate(name.clone()))?;
                if let Arity::Fixed(n) = kind.arity() {
                    if n != args.len() {
                        return Err(BindgenError::TemplateArity {
                            name: name.clone(),
                            expected: n.to_string(),
                            found: args.len().to_string(),
                        });
                    }
                }
                let args = args
                    .iter()
                    .map(|a| self.resolve(a, context))
                    .collect::<Result<Vec<_>>>()?;
                Type::template(kind, args)
            }
            TypeSpec::Function(func) => Type::Func(self.resolve_func(func, context)?),
            TypeSpec::Const(inner) => Type::Const(Box::new(self.resolve(inner, context)?)),
            TypeSpec::Pointer(inner) => Type::Pointer(Box::new(self.resolve(inner, context)?)),
            TypeSpec::Ref(inner) => Type::Ref(Box::new(self.resolve(inner, context)?)),
            TypeSpec::RRef(inner) => Type::RRef(Box::new(self.resolve(inner, context)?)),
        })
    }

    fn resolve_func(&self, func: &FunctionSpec, context: &str) -> Result<Func> {
        let mut args = Vec::with_capacity(func.args.len());
        for arg in &func.args {
            if arg.name.starts_with('_') {
                return Err(BindgenError::ReservedArgName {
                    method: context.to_string(),
                    arg: arg.name.clone(),
                });
            }
            args.push(Arg {
                name: arg.name.clone(),
                ty: self.resolve(&arg.ty, context)?,
            });
        }
        Ok(Func {
            ret: Box::new(self.resolve(&func.ret, context)?),
            args,
            is_const: func.is_const,
            noexcept: func.is_noexcept,
            off_thread: func.is_off_thread,
        })
    }

    /// Class names with roots first, each followed by its descendants
    fn class_order(&self) -> Result<Vec<&'a str>> {
        let classes: &'a IndexMap<String, ClassSpec> = &self.raw.classes;

        for (name, cls) in classes {
            if let Some(base) = &cls.base {
                if !classes.contains_key(base) {
                    return Err(if self.types.contains_key(base) {
                        BindgenError::BaseNotClass {
                            class: name.clone(),
                            base: base.clone(),
                        }
                    } else {
                        BindgenError::UnknownType(base.clone())
                    });
                }
            }
        }

        for name in classes.keys() {
            let mut seen = HashSet::new();
            let mut current = name.as_str();
            while let Some(base) = classes[current].base.as_deref() {
                if !seen.insert(current) {
                    return Err(BindgenError::BaseClassLoop(name.clone()));
                }
                current = base;
            }
        }

        fn visit<'s>(classes: &'s IndexMap<String, ClassSpec>, name: &'s str, out: &mut Vec<&'s str>) {
            out.push(name);
            for (sub, cls) in classes {
                if cls.base.as_deref() == Some(name) {
                    visit(classes, sub, out);
                }
            }
        }

        let mut order = Vec::with_capacity(classes.len());
        for (name, cls) in classes {
            if cls.base.is_none() {
                visit(classes, name, &mut order);
            }
        }
        Ok(order)
    }
}

/// Resolve a raw spec into a bound model
///
/// Opt-in flags come from `opt_in`; without one every member is opted in.
pub fn bind_model(raw: &RawSpec, opt_in: Option<&OptInSpec>) -> Result<BoundSpec> {
    let mut binder = Binder {
        raw,
        templates: IndexMap::new(),
        types: IndexMap::new(),
    };

    for (name, arity) in &raw.templates {
        let kind = TemplateKind::from_name(name)
            .ok_or_else(|| BindgenError::UnsupportedTemplate(name.clone()))?;
        if kind.arity() != *arity {
            return Err(BindgenError::TemplateArity {
                name: name.clone(),
                expected: kind.arity().to_string(),
                found: arity.to_string(),
            });
        }
        binder.templates.insert(name.clone(), kind);
    }

    for name in &raw.primitives {
        let primitive = Primitive::from_name(name)
            .ok_or_else(|| BindgenError::UnsupportedPrimitive(name.clone()))?;
        binder.add_type(name, Type::Primitive(primitive))?;
    }

    let mut opaque_types = Vec::new();
    for (i, name) in raw.opaque_types.iter().enumerate() {
        binder.add_named_type(name, Type::Opaque(OpaqueId(i)))?;
        opaque_types.push(Opaque {
            id: OpaqueId(i),
            name: name.clone(),
        });
    }

    let mut enums = Vec::new();
    for (i, (name, spec)) in raw.enums.iter().enumerate() {
        binder.add_named_type(name, Type::Enum(EnumId(i)))?;
        enums.push(Enum {
            id: EnumId(i),
            name: name.clone(),
            cpp_name: spec.cpp_name.clone(),
            enumerators: spec
                .values
                .iter()
                .map(|(name, value)| Enumerator {
                    name: name.clone(),
                    value: *value,
                })
                .collect(),
        });
    }

    for (i, name) in raw.records.keys().enumerate() {
        binder.add_named_type(name, Type::Struct(StructId(i)))?;
    }

    let order = binder.class_order()?;
    let ids: IndexMap<&str, ClassId> = order
        .iter()
        .enumerate()
        .map(|(i, name)| (*name, ClassId(i)))
        .collect();
    for name in &order {
        let spec = &raw.classes[*name];
        let id = ids[name];
        binder.add_named_type(name, Type::Class(id))?;
        if let Some(alias) = &spec.shared_ptr_wrapped {
            binder.add_type(
                alias,
                Type::template(TemplateKind::SharedPtr, vec![Type::Class(id)]),
            )?;
        }
    }

    for (i, name) in raw.key_types.keys().enumerate() {
        binder.add_named_type(name, Type::KeyType(KeyTypeId(i)))?;
    }

    for (name, spec) in &raw.type_aliases {
        let ty = binder.resolve(spec, name)?;
        binder.add_type(name, ty)?;
    }

    let mut key_types = Vec::new();
    for (i, (name, spec)) in raw.key_types.iter().enumerate() {
        key_types.push(KeyType {
            id: KeyTypeId(i),
            name: name.clone(),
            ty: binder.resolve(spec, name)?,
        });
    }

    if let Some(opt_in) = opt_in {
        for (record, fields) in &opt_in.records {
            let spec = raw.records.get(record).ok_or_else(|| BindgenError::UnknownOptIn {
                kind: "record",
                path: record.clone(),
            })?;
            for field in &fields.fields {
                if !spec.fields.contains_key(field) {
                    return Err(BindgenError::UnknownOptIn {
                        kind: "field",
                        path: format!("{}.{}", record, field),
                    });
                }
            }
        }
    }

    let mut records = Vec::new();
    for (i, (name, spec)) in raw.records.iter().enumerate() {
        let mut fields = Vec::new();
        for (field_name, field) in &spec.fields {
            let ty = binder.resolve(&field.ty, &format!("{}.{}", name, field_name))?;
            let required = field.default.is_none() && !ty.is_nullable();
            fields.push(Field {
                name: field_name.clone(),
                cpp_name: field.cpp_name.clone(),
                ty,
                required,
                default: field.default.clone(),
                opted_in: opt_in.map(|o| o.has_field(name, field_name)).unwrap_or(true),
            });
        }
        records.push(Struct {
            id: StructId(i),
            name: name.clone(),
            cpp_name: spec.cpp_name.clone(),
            fields,
        });
    }

    let mut classes = Vec::with_capacity(order.len());
    for name in &order {
        let spec = &raw.classes[*name];
        let id = ids[name];
        let base = spec.base.as_deref().map(|b| ids[b]);
        let subclasses: Vec<ClassId> = order
            .iter()
            .filter(|other| raw.classes[**other].base.as_deref() == Some(*name))
            .map(|other| ids[other])
            .collect();

        if spec.shared_ptr_wrapped.is_some() && (base.is_some() || !subclasses.is_empty()) {
            return Err(BindgenError::SharedPtrHierarchy(name.to_string()));
        }

        let methods = bind_methods(&binder, id, name, spec, opt_in)?;
        let iterable = spec
            .iterable
            .as_ref()
            .map(|t| binder.resolve(t, name))
            .transpose()?;

        classes.push(Class {
            id,
            name: name.to_string(),
            cpp_name: spec.cpp_name.clone(),
            base,
            subclasses,
            methods,
            iterable,
            needs_deref: spec.needs_deref,
            shared_ptr_wrapped: spec.shared_ptr_wrapped.clone(),
            is_abstract: spec.is_abstract,
        });
    }

    if let Some(opt_in) = opt_in {
        for (class, opted) in &opt_in.classes {
            let cls = classes
                .iter()
                .find(|c| &c.name == class)
                .ok_or_else(|| BindgenError::UnknownOptIn {
                    kind: "class",
                    path: class.clone(),
                })?;
            for method in &opted.methods {
                if !cls.methods.iter().any(|m| &m.unique_name == method) {
                    return Err(BindgenError::UnknownOptIn {
                        kind: "method",
                        path: format!("{}.{}", class, method),
                    });
                }
            }
        }
    }

    let mut getters = Vec::new();
    for (tag, data_type) in &raw.mixed_info.data_types {
        getters.push(MixedGetter {
            data_type: tag.clone(),
            getter: data_type.getter.clone(),
            ty: binder.resolve(&data_type.ty, "mixedInfo")?,
        });
    }
    let mut ctors: Vec<Type> = getters.iter().map(|g| g.ty.clone()).collect();
    for ctor in &raw.mixed_info.extra_ctors {
        ctors.push(binder.resolve(ctor, "mixedInfo")?);
    }
    let mixed_info = MixedInfo {
        getters,
        unused_data_types: raw.mixed_info.unused_data_types.clone(),
        ctors,
    };

    tracing::debug!(
        classes = classes.len(),
        records = records.len(),
        enums = enums.len(),
        "bound model built"
    );

    Ok(BoundSpec {
        headers: raw.headers.clone(),
        classes,
        records,
        enums,
        key_types,
        opaque_types,
        mixed_info,
        types: binder.types,
    })
}

fn bind_methods(
    binder: &Binder<'_>,
    id: ClassId,
    class_name: &str,
    spec: &ClassSpec,
    opt_in: Option<&OptInSpec>,
) -> Result<Vec<Method>> {
    let shared = spec.shared_ptr_wrapped.is_some();
    let mut methods = Vec::new();

    let mut push = |name: &str, unique_name: String, cpp_name: String, kind: MethodKind, sig: Func| {
        methods.push(Method {
            class: id,
            class_name: class_name.to_string(),
            class_cpp_name: spec.cpp_name.clone(),
            name: name.to_string(),
            opted_in: opt_in
                .map(|o| o.has_method(class_name, &unique_name))
                .unwrap_or(true),
            unique_name,
            cpp_name,
            kind,
            sig,
            async_transform: None,
            shared_ctor: kind == MethodKind::Constructor && shared,
        });
    };

    for (name, ctor) in &spec.constructors {
        let context = format!("{}_{}", class_name, name);
        let mut sig = binder.resolve_func(ctor, &context)?;
        let this = Type::Class(id);
        sig.ret = Box::new(if shared {
            Type::template(TemplateKind::SharedPtr, vec![this])
        } else {
            this
        });
        push(name, name.clone(), name.clone(), MethodKind::Constructor, sig);
    }

    type Bound = (String, String, String, MethodKind, Func);
    let overloads = |methods: &IndexMap<String, Vec<MethodSpec>>,
                     kind: MethodKind|
     -> Result<Vec<Bound>> {
        let mut out = Vec::new();
        for (name, overloads) in methods {
            for overload in overloads {
                let unique_name = match &overload.suffix {
                    Some(suffix) => format!("{}_{}", name, suffix),
                    None => name.clone(),
                };
                let context = format!("{}_{}", class_name, unique_name);
                let sig = binder.resolve_func(&overload.sig, &context)?;
                let cpp_name = overload.cpp_name.clone().unwrap_or_else(|| name.clone());
                out.push((name.clone(), unique_name, cpp_name, kind, sig));
            }
        }
        Ok(out)
    };

    for (name, unique_name, cpp_name, kind, sig) in overloads(&spec.methods, MethodKind::Instance)?
        .into_iter()
        .chain(overloads(&spec.static_methods, MethodKind::Static)?)
    {
        push(&name, unique_name, cpp_name, kind, sig);
    }

    for (name, ty) in &spec.properties {
        let context = format!("{}_{}", class_name, name);
        let sig = Func {
            ret: Box::new(binder.resolve(ty, &context)?),
            args: Vec::new(),
            is_const: true,
            noexcept: false,
            off_thread: false,
        };
        push(name, name.clone(), name.clone(), MethodKind::Property, sig);
    }

    let mut seen = HashSet::new();
    for method in &mut methods {
        let id = method.id();
        if !seen.insert(method.unique_name.clone()) {
            return Err(BindgenError::DuplicateMethod(id));
        }
        if matches!(method.kind, MethodKind::Instance | MethodKind::Static) {
            method.async_transform = method.sig.async_transform(&id)?;
        }
    }

    Ok(methods)
}
