//! Type-model consistency checks.
//!
//! Every check runs over the whole type model and every problem is
//! returned. The parser attributes each problem to the line of the
//! offending definition or member; `validate_type_model` joins them into a
//! single validation error.

use std::collections::{BTreeMap, HashSet};

use crate::resolve::{effective_type, effective_user_type, enum_values, struct_members};
use crate::types::{Attr, BuiltinType, Section, Type, Types, UserType};

/// A consistency problem in a type model.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TypeModelError {
    /// The user type the problem belongs to.
    pub type_name: String,
    /// The struct member or enum value the problem belongs to, if any.
    pub member: Option<String>,
    pub message: String,
}

impl TypeModelError {
    fn new(type_name: &str, member: Option<&str>, message: String) -> Self {
        Self {
            type_name: type_name.to_string(),
            member: member.map(str::to_string),
            message,
        }
    }
}

/// Check a type model's types for unknown references, invalid attributes,
/// invalid or circular bases, redefined members/values and inconsistent
/// names.
pub fn type_model_errors(types: &Types) -> Vec<TypeModelError> {
    let mut errors = Vec::new();

    for (type_name, user_type) in types {
        if user_type.name() != type_name {
            errors.push(TypeModelError::new(
                type_name,
                None,
                format!("Inconsistent type name '{}' for '{}'", user_type.name(), type_name),
            ));
        }

        match user_type {
            UserType::Struct(strct) => {
                for base_name in &strct.bases {
                    let valid = matches!(
                        effective_user_type(types, base_name),
                        Some(UserType::Struct(base)) if base.union == strct.union
                    );
                    if !valid {
                        errors.push(TypeModelError::new(
                            type_name,
                            None,
                            format!("Invalid struct base type '{base_name}'"),
                        ));
                    }
                }

                match struct_members(types, strct) {
                    Ok(members) => {
                        let mut seen = HashSet::new();
                        for member in members {
                            if !seen.insert(member.name.as_str()) {
                                errors.push(TypeModelError::new(
                                    type_name,
                                    Some(&member.name),
                                    format!("Redefinition of '{type_name}' member '{}'", member.name),
                                ));
                            }
                            check_type(
                                &mut errors,
                                types,
                                &member.ty,
                                member.attr.as_ref(),
                                &strct.name,
                                Some(&member.name),
                            );
                        }
                    }
                    Err(_) => errors.push(TypeModelError::new(
                        type_name,
                        None,
                        format!("Circular base type detected for type '{type_name}'"),
                    )),
                }
            }

            UserType::Enum(enm) => {
                for base_name in &enm.bases {
                    if !matches!(effective_user_type(types, base_name), Some(UserType::Enum(_))) {
                        errors.push(TypeModelError::new(
                            type_name,
                            None,
                            format!("Invalid enum base type '{base_name}'"),
                        ));
                    }
                }

                match enum_values(types, enm) {
                    Ok(values) => {
                        let mut seen = HashSet::new();
                        for value in values {
                            if !seen.insert(value.name.as_str()) {
                                errors.push(TypeModelError::new(
                                    type_name,
                                    Some(&value.name),
                                    format!("Redefinition of '{type_name}' value '{}'", value.name),
                                ));
                            }
                        }
                    }
                    Err(_) => errors.push(TypeModelError::new(
                        type_name,
                        None,
                        format!("Circular base type detected for type '{type_name}'"),
                    )),
                }
            }

            UserType::Typedef(typedef) => {
                check_type(&mut errors, types, &typedef.ty, typedef.attr.as_ref(), type_name, None);
            }

            UserType::Action(action) => {
                for section in Section::ALL {
                    if let Some(section_type) = action.section(section) {
                        check_type(
                            &mut errors,
                            types,
                            &Type::User(section_type.to_string()),
                            None,
                            type_name,
                            None,
                        );
                    }
                }

                // Path, query and input members share one namespace.
                let mut member_sections: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
                for section in [Section::Path, Section::Query, Section::Input] {
                    let Some(section_type) = action.section(section) else {
                        continue;
                    };
                    if let Some(UserType::Struct(section_struct)) = effective_user_type(types, section_type)
                        && let Ok(members) = struct_members(types, section_struct)
                    {
                        for member in members {
                            member_sections
                                .entry(member.name.as_str())
                                .or_default()
                                .push(section_struct.name.as_str());
                        }
                    }
                }
                for (member_name, section_names) in member_sections {
                    if section_names.len() > 1 {
                        for section_name in section_names {
                            errors.push(TypeModelError::new(
                                section_name,
                                Some(member_name),
                                format!("Redefinition of '{section_name}' member '{member_name}'"),
                            ));
                        }
                    }
                }
            }
        }
    }

    errors
}

fn check_type(
    errors: &mut Vec<TypeModelError>,
    types: &Types,
    ty: &Type,
    attr: Option<&Attr>,
    type_name: &str,
    member_name: Option<&str>,
) {
    match ty {
        Type::Builtin(_) => {}
        Type::Array(array) => {
            let element_type = effective_type(types, &array.ty);
            check_type(errors, types, element_type, array.attr.as_ref(), type_name, member_name);
        }
        Type::Dict(dict) => {
            let value_type = effective_type(types, &dict.ty);
            check_type(errors, types, value_type, dict.attr.as_ref(), type_name, member_name);

            if let Some(key_type) = &dict.key_type {
                let key_type = effective_type(types, key_type);
                check_type(errors, types, key_type, dict.key_attr.as_ref(), type_name, member_name);

                let valid_key = match key_type {
                    Type::Builtin(BuiltinType::String) => true,
                    Type::User(name) => matches!(types.get(name), Some(UserType::Enum(_))),
                    _ => false,
                };
                if !valid_key {
                    push_error(errors, "Invalid dictionary key type", type_name, member_name);
                }
            }
        }
        Type::User(name) => match types.get(name) {
            None => push_error(errors, &format!("Unknown type '{name}'"), type_name, member_name),
            Some(UserType::Action(_)) => push_error(
                errors,
                &format!("Invalid reference to action '{name}'"),
                type_name,
                member_name,
            ),
            Some(_) => {}
        },
    }

    // Numeric bounds apply to int and float, length bounds to string, array
    // and dict. Nullable applies everywhere.
    if let Some(attr) = attr {
        let (numeric_ok, length_ok) = match effective_type(types, ty) {
            Type::Builtin(BuiltinType::Int | BuiltinType::Float) => (true, false),
            Type::Builtin(BuiltinType::String) | Type::Array(_) | Type::Dict(_) => (false, true),
            _ => (false, false),
        };
        for bound in attr.bounds() {
            let allowed = if bound.is_length() { length_ok } else { numeric_ok };
            if !allowed {
                push_error(errors, &format!("Invalid attribute '{bound}'"), type_name, member_name);
            }
        }
    }
}

fn push_error(errors: &mut Vec<TypeModelError>, message: &str, type_name: &str, member_name: Option<&str>) {
    let message = match member_name {
        Some(member) => format!("{message} from '{type_name}' member '{member}'"),
        None => format!("{message} from '{type_name}'"),
    };
    errors.push(TypeModelError::new(type_name, member_name, message));
}
