//! Path expressions
//!
//! A path expression names a walk through the model graph:
//!
//! ```text
//! $post.title > $author:user.email        forward hop with an alias
//! $user > .id$post.title                  incoming hop (post points at user.id)
//! $post >? #tag                           outer join, include every tag field
//! $user.email@contact                     bind an output name
//! =concat($user.first, $user.last)@name   computed field
//! ```
//!
//! [`compile`] turns the text into an ordered list of [`Accessor`]s;
//! [`accessors_to_path`] renders the canonical text back.

mod parser;

pub use parser::compile;

use std::fmt::{self, Write as _};

use compact_str::CompactString;
use serde::Serialize;

/// What an accessor loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Loader {
    /// A field of the model, or the bare model as a join mount.
    Access,
    /// Every field of the model as a nested composite.
    Include,
    /// A named transform over argument paths.
    Method,
}

impl Loader {
    pub const fn as_str(self) -> &'static str {
        match self {
            Loader::Access => "access",
            Loader::Include => "include",
            Loader::Method => "method",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodCall {
    pub name: CompactString,
    pub args: Vec<Vec<Accessor>>,
}

/// One parsed path segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Accessor {
    pub loader: Loader,
    /// Model name; empty for methods.
    pub model: CompactString,
    pub field: Option<CompactString>,
    /// Field on the previous accessor's model that this model points back at.
    pub target: Option<CompactString>,
    /// Alias of the model in the statement; equals `model` unless aliased.
    pub series: CompactString,
    /// Reached through an outer join.
    pub optional: bool,
    /// Output name from `@name`.
    pub bind: Option<CompactString>,
    pub method: Option<MethodCall>,
}

impl Accessor {
    /// `$model` or `$model.field`.
    pub fn access(model: impl Into<CompactString>, field: Option<&str>) -> Self {
        let model = model.into();
        Self {
            loader: Loader::Access,
            series: model.clone(),
            model,
            field: field.map(CompactString::from),
            target: None,
            optional: false,
            bind: None,
            method: None,
        }
    }

    /// `#model`.
    pub fn include(model: impl Into<CompactString>) -> Self {
        Self {
            loader: Loader::Include,
            ..Self::access(model, None)
        }
    }

    /// `=name(args..)`.
    pub fn method(name: impl Into<CompactString>, args: Vec<Vec<Accessor>>) -> Self {
        Self {
            loader: Loader::Method,
            method: Some(MethodCall {
                name: name.into(),
                args,
            }),
            ..Self::access(CompactString::default(), None)
        }
    }

    pub fn alias(mut self, alias: impl Into<CompactString>) -> Self {
        self.series = alias.into();
        self
    }

    pub fn target(mut self, field: impl Into<CompactString>) -> Self {
        self.target = Some(field.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn bind(mut self, name: impl Into<CompactString>) -> Self {
        self.bind = Some(name.into());
        self
    }

    pub fn is_aliased(&self) -> bool {
        self.series != self.model
    }

    fn render(&self, out: &mut String) -> fmt::Result {
        if let Some(target) = &self.target {
            write!(out, ".{target}")?;
        }
        match self.loader {
            Loader::Access | Loader::Include => {
                out.push(if self.loader == Loader::Access { '$' } else { '#' });
                if self.is_aliased() {
                    write!(out, "{}:", self.series)?;
                }
                out.push_str(&self.model);
                if let Some(field) = &self.field {
                    write!(out, ".{field}")?;
                }
            }
            Loader::Method => {
                if let Some(call) = &self.method {
                    write!(out, "={}(", call.name)?;
                    for (idx, arg) in call.args.iter().enumerate() {
                        if idx > 0 {
                            out.push(',');
                        }
                        render_list(arg, out)?;
                    }
                    out.push(')');
                }
            }
        }
        if let Some(bind) = &self.bind {
            write!(out, "@{bind}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.render(&mut out)?;
        f.write_str(&out)
    }
}

fn render_list(accessors: &[Accessor], out: &mut String) -> fmt::Result {
    for (idx, accessor) in accessors.iter().enumerate() {
        if idx > 0 {
            out.push_str(if accessor.optional { ">?" } else { ">" });
        }
        accessor.render(out)?;
    }
    Ok(())
}

/// Renders the canonical path text for `accessors`.
///
/// Compiling the result yields an equal accessor list.
pub fn accessors_to_path(accessors: &[Accessor]) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = render_list(accessors, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn renders_canonical_form() {
        let path = [
            Accessor::access("post", Some("title")),
            Accessor::access("user", Some("email")).alias("author").bind("by"),
            Accessor::include("tag").optional(),
            Accessor::access("comment", None).target("id"),
        ];
        assert_eq!(
            accessors_to_path(&path),
            "$post.title>$author:user.email@by>?#tag>.id$comment"
        );
    }

    #[test]
    fn renders_methods() {
        let path = [Accessor::method(
            "concat",
            vec![
                vec![Accessor::access("user", Some("first"))],
                vec![Accessor::access("user", Some("last"))],
            ],
        )
        .bind("name")];
        assert_eq!(accessors_to_path(&path), "=concat($user.first,$user.last)@name");
    }

    fn ident() -> impl Strategy<Value = String> {
        "[a-z][a-zA-Z0-9_]{0,6}"
    }

    fn segment() -> impl Strategy<Value = Accessor> {
        (
            ident(),
            prop::option::of("[a-z][a-z0-9_]{0,4}(\\.[a-z][a-z0-9_]{0,4}){0,2}"),
            prop::option::of(ident()),
            prop::option::of(ident()),
            prop::option::of(ident()),
            any::<bool>(),
            any::<bool>(),
        )
            .prop_map(|(model, field, alias, target, bind, include, optional)| {
                let mut accessor = if include {
                    Accessor::include(model.as_str())
                } else {
                    Accessor::access(model.as_str(), field.as_deref())
                };
                if let Some(alias) = alias {
                    accessor = accessor.alias(alias);
                }
                accessor.target = target.map(CompactString::from);
                accessor.bind = bind.map(CompactString::from);
                accessor.optional = optional;
                accessor
            })
    }

    fn path() -> impl Strategy<Value = Vec<Accessor>> {
        prop::collection::vec(segment(), 1..5).prop_map(|mut list| {
            // The first segment has no join in front of it.
            list[0].optional = false;
            list[0].target = None;
            list
        })
    }

    proptest! {
        #[test]
        fn render_then_compile_round_trips(list in path()) {
            let text = accessors_to_path(&list);
            let compiled = compile(&text).unwrap();
            prop_assert_eq!(&compiled, &list);
            prop_assert_eq!(accessors_to_path(&compiled), text);
        }

        #[test]
        fn methods_round_trip(args in prop::collection::vec(path(), 0..3), bind in prop::option::of(ident())) {
            let mut method = Accessor::method("fn_1", args);
            method.bind = bind.map(CompactString::from);
            let list = vec![method];
            let text = accessors_to_path(&list);
            prop_assert_eq!(compile(&text).unwrap(), list);
        }
    }
}
