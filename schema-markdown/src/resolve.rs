//! Read-only queries over a type model.
//!
//! These are the accessors the documentation renderer and the validator use
//! to introspect types: effective (inherited-first) struct members and enum
//! values, typedef resolution, and the closure of types referenced from a
//! named type. None of them mutate the type model.

use std::collections::HashSet;

use crate::error::ResolveError;
use crate::types::{Enum, EnumValue, Struct, StructMember, Type, Types, UserType};

/// Resolve a type reference through typedef chains to the first non-typedef
/// type. Unknown user types resolve to themselves.
pub fn effective_type<'a>(types: &'a Types, ty: &'a Type) -> &'a Type {
    let mut current = ty;
    let mut seen: HashSet<&str> = HashSet::new();
    while let Type::User(name) = current {
        match types.get(name) {
            Some(UserType::Typedef(typedef)) if seen.insert(name.as_str()) => {
                current = &typedef.ty;
            }
            _ => break,
        }
    }
    current
}

/// Look up a user type by name, resolving typedefs. Returns `None` when the
/// name is unknown or the typedef chain ends in a non-user type.
pub fn effective_user_type<'a>(types: &'a Types, name: &str) -> Option<&'a UserType> {
    match types.get(name)? {
        UserType::Typedef(typedef) => match effective_type(types, &typedef.ty) {
            Type::User(target) => match types.get(target) {
                Some(UserType::Typedef(_)) => None,
                other => other,
            },
            _ => None,
        },
        user_type => Some(user_type),
    }
}

/// The struct's effective member list: members of each base (recursively,
/// bases resolved through typedefs) in order, then the struct's own members.
///
/// Bases that do not resolve to a struct contribute nothing. A base chain
/// that leads back to a struct already being expanded fails with
/// [`ResolveError::CircularBase`] naming `strct`.
pub fn struct_members<'a>(
    types: &'a Types,
    strct: &'a Struct,
) -> Result<Vec<&'a StructMember>, ResolveError> {
    let mut members = Vec::new();
    let mut path = vec![strct.name.as_str()];
    collect_members(types, strct, &mut path, &mut members)
        .map_err(|()| ResolveError::CircularBase(strct.name.clone()))?;
    Ok(members)
}

fn collect_members<'a>(
    types: &'a Types,
    strct: &'a Struct,
    path: &mut Vec<&'a str>,
    members: &mut Vec<&'a StructMember>,
) -> Result<(), ()> {
    for base in &strct.bases {
        if let Some(UserType::Struct(base_struct)) = effective_user_type(types, base) {
            if path.contains(&base_struct.name.as_str()) {
                return Err(());
            }
            path.push(&base_struct.name);
            collect_members(types, base_struct, path, members)?;
            path.pop();
        }
    }
    members.extend(strct.members.iter());
    Ok(())
}

/// The enum's effective value list: inherited values first, then its own.
/// Same base resolution and cycle rules as [`struct_members`].
pub fn enum_values<'a>(types: &'a Types, enm: &'a Enum) -> Result<Vec<&'a EnumValue>, ResolveError> {
    let mut values = Vec::new();
    let mut path = vec![enm.name.as_str()];
    collect_values(types, enm, &mut path, &mut values)
        .map_err(|()| ResolveError::CircularBase(enm.name.clone()))?;
    Ok(values)
}

fn collect_values<'a>(
    types: &'a Types,
    enm: &'a Enum,
    path: &mut Vec<&'a str>,
    values: &mut Vec<&'a EnumValue>,
) -> Result<(), ()> {
    for base in &enm.bases {
        if let Some(UserType::Enum(base_enum)) = effective_user_type(types, base) {
            if path.contains(&base_enum.name.as_str()) {
                return Err(());
            }
            path.push(&base_enum.name);
            collect_values(types, base_enum, path, values)?;
            path.pop();
        }
    }
    values.extend(enm.values.iter());
    Ok(())
}

/// The closure of user types referenced from `type_name` (including itself):
/// struct bases and member types, enum bases, typedef targets and action
/// section types.
pub fn referenced_types(types: &Types, type_name: &str) -> Result<Types, ResolveError> {
    let mut referenced = Types::new();
    add_referenced(types, &Type::User(type_name.to_string()), &mut referenced)?;
    Ok(referenced)
}

fn add_referenced(types: &Types, ty: &Type, referenced: &mut Types) -> Result<(), ResolveError> {
    match ty {
        Type::Builtin(_) => {}
        Type::Array(array) => add_referenced(types, &array.ty, referenced)?,
        Type::Dict(dict) => {
            add_referenced(types, &dict.ty, referenced)?;
            if let Some(key_type) = &dict.key_type {
                add_referenced(types, key_type, referenced)?;
            }
        }
        Type::User(name) => {
            if referenced.contains_key(name) {
                return Ok(());
            }
            let user_type = types
                .get(name)
                .ok_or_else(|| ResolveError::UnknownType(name.clone()))?;
            referenced.insert(name.clone(), user_type.clone());

            match user_type {
                UserType::Struct(strct) => {
                    for base in &strct.bases {
                        add_referenced(types, &Type::User(base.clone()), referenced)?;
                    }
                    for member in struct_members(types, strct)? {
                        add_referenced(types, &member.ty, referenced)?;
                    }
                }
                UserType::Enum(enm) => {
                    for base in &enm.bases {
                        add_referenced(types, &Type::User(base.clone()), referenced)?;
                    }
                }
                UserType::Typedef(typedef) => add_referenced(types, &typedef.ty, referenced)?,
                UserType::Action(action) => {
                    for section in crate::types::Section::ALL {
                        if let Some(section_type) = action.section(section) {
                            add_referenced(types, &Type::User(section_type.to_string()), referenced)?;
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_schema_markdown;
    use pretty_assertions::assert_eq;

    fn names<T>(items: &[&T], name: impl Fn(&T) -> &str) -> Vec<String> {
        items.iter().map(|item| name(*item).to_string()).collect()
    }

    #[test]
    fn shared_base_members_come_first() {
        let types = parse_schema_markdown(
            "struct Base\n    int id\n\nstruct Left (Base)\n    string l\n\nstruct Right (Base)\n    string r\n",
        )
        .unwrap();

        let left = types["Left"].as_struct().unwrap();
        let right = types["Right"].as_struct().unwrap();
        let left_members = struct_members(&types, left).unwrap();
        let right_members = struct_members(&types, right).unwrap();
        assert_eq!(names(&left_members, |m| m.name.as_str()), vec!["id", "l"]);
        assert_eq!(names(&right_members, |m| m.name.as_str()), vec!["id", "r"]);
        assert!(std::ptr::eq(left_members[0], right_members[0]));
    }

    #[test]
    fn bases_through_typedef() {
        let types = parse_schema_markdown(
            "enum Color\n    Red\n\ntypedef Color ColorAlias\n\nenum MoreColor (ColorAlias)\n    Blue\n",
        )
        .unwrap();
        let more = types["MoreColor"].as_enum().unwrap();
        let values = enum_values(&types, more).unwrap();
        assert_eq!(names(&values, |v| v.name.as_str()), vec!["Red", "Blue"]);
    }

    #[test]
    fn circular_base_is_an_error() {
        let mut types = Types::new();
        for (name, base) in [("A", "B"), ("B", "A")] {
            types.insert(
                name.into(),
                UserType::Struct(Struct {
                    name: name.into(),
                    bases: vec![base.into()],
                    ..Default::default()
                }),
            );
        }
        let a = types["A"].as_struct().unwrap();
        assert_eq!(
            struct_members(&types, a).unwrap_err(),
            ResolveError::CircularBase("A".into())
        );
    }

    #[test]
    fn diamond_bases_are_not_circular() {
        let types = parse_schema_markdown(
            "struct A\n    int a\n\nstruct B (A)\n    int b\n\nstruct C (A)\n    int c\n\nstruct D (B, C)\n    int d\n",
        );
        // Diamond inheritance repeats A's members, which finalize reports
        // as a member redefinition rather than a cycle.
        let err = types.unwrap_err();
        assert_eq!(err.errors(), vec![":10: error: Redefinition of 'D' member 'a'"]);
    }

    #[test]
    fn effective_type_follows_typedefs() {
        let types = parse_schema_markdown("typedef int(> 0) Positive\n\ntypedef Positive Count\n").unwrap();
        let ty = Type::User("Count".into());
        assert_eq!(
            effective_type(&types, &ty),
            &Type::Builtin(crate::types::BuiltinType::Int)
        );
        assert!(effective_user_type(&types, "Count").is_none());
    }

    #[test]
    fn referenced_types_closure() {
        let types = parse_schema_markdown(
            "struct Order\n    Item[] items\n    Status status\n\nstruct Item\n    string sku\n\nenum Status\n    Open\n\nstruct Unrelated\n    int x\n",
        )
        .unwrap();
        let referenced = referenced_types(&types, "Order").unwrap();
        assert_eq!(
            referenced.keys().cloned().collect::<Vec<_>>(),
            vec!["Item", "Order", "Status"]
        );
    }

    #[test]
    fn referenced_types_unknown() {
        let types = Types::new();
        assert_eq!(
            referenced_types(&types, "Nope").unwrap_err(),
            ResolveError::UnknownType("Nope".into())
        );
    }
}
