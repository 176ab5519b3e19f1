//! Macros for defining closed wire enumerations.

/// Macro for defining a kind enum.
///
/// Every variant carries its canonical wire string and, optionally, synonyms
/// accepted on parsing only. [`Display`] and serialization always emit the
/// canonical string.
///
/// The calling crate must depend on `serde` and `strum`.
///
/// # Example
///
/// ```rust
/// # use crate::common::define_kind;
///
/// define_kind! {
///     #[doc = "Shape kind."]
///     enum Kind {
///         #[doc = "A cube"]
///         #[wire("cube", "box")]
///         Cube = 1,
///
///         #[doc = "A sphere"]
///         #[wire("sphere")]
///         Sphere = 2,
///     }
/// }
/// ```
///
/// [`Display`]: std::fmt::Display
#[expect(clippy::module_name_repetitions, reason = "more readable")]
#[macro_export]
macro_rules! define_kind {
    (
        #[doc = $doc:literal]
        enum $name:ident {
            $(
                #[doc = $variant_doc:literal]
                #[wire($wire:literal $(, $alias:literal)* $(,)?)]
                $variant:ident = $value:expr
            ),* $(,)?
        }
    ) => {
        #[derive(
            Clone,
            Copy,
            Debug,
            $crate::private::serde::Deserialize,
            $crate::private::strum::Display,
            $crate::private::strum::EnumString,
            Eq,
            Hash,
            Ord,
            PartialEq,
            PartialOrd,
            $crate::private::serde::Serialize,
        )]
        #[doc = $doc]
        #[repr(u8)]
        pub enum $name {
            $(
                #[doc = $variant_doc]
                #[serde(rename = $wire $(, alias = $alias)*)]
                #[strum(to_string = $wire $(, serialize = $alias)*)]
                $variant = $value,
            )*
        }

        impl $name {
            /// All the variants, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),*];

            /// Converts this into its [`u8`] representation.
            #[must_use]
            pub const fn u8(self) -> u8 {
                self as u8
            }

            /// Returns the canonical wire representation of this value.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)*
                }
            }
        }

        #[cfg(feature = "postgres")]
        impl<'a> $crate::private::postgres_types::FromSql<'a> for $name {
            $crate::private::postgres_types::accepts!(INT2);

            fn from_sql(
                ty: &$crate::private::postgres_types::Type,
                raw: &[u8],
            ) -> Result<
                $name,
                Box<dyn ::std::error::Error
                    + ::core::marker::Sync
                    + ::core::marker::Send>,
            > {
                match u8::try_from(i16::from_sql(ty, raw)?)? {
                    $(
                        v if Self::$variant.u8() == v => Ok(Self::$variant),
                    )*
                    v => Err(::std::format!(
                        "invalid `{}` value: {v}",
                        ::core::stringify!($name),
                    ).into()),
                }
            }
        }

        #[cfg(feature = "postgres")]
        impl $crate::private::postgres_types::ToSql for $name {
            $crate::private::postgres_types::accepts!(INT2);
            $crate::private::postgres_types::to_sql_checked!();

            fn to_sql(
                &self,
                ty: &$crate::private::postgres_types::Type,
                w: &mut $crate::private::postgres_types::private::BytesMut,
            ) -> Result<
                $crate::private::postgres_types::IsNull,
                ::std::boxed::Box<
                    dyn ::std::error::Error
                        + ::core::marker::Sync
                        + ::core::marker::Send
                >,
            > {
                i16::from(self.u8()).to_sql(ty, w)
            }
        }
    };
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use crate::define_kind;

    define_kind! {
        #[doc = "Test kind."]
        enum Answer {
            #[doc = "Yes."]
            #[wire("yes", "yep", "aye")]
            Yes = 1,

            #[doc = "No."]
            #[wire("no")]
            No = 2,
        }
    }

    #[test]
    fn parses_canonical_and_synonyms() {
        assert_eq!(Answer::from_str("yes").unwrap(), Answer::Yes);
        assert_eq!(Answer::from_str("yep").unwrap(), Answer::Yes);
        assert_eq!(Answer::from_str("aye").unwrap(), Answer::Yes);
        assert_eq!(Answer::from_str("no").unwrap(), Answer::No);

        assert!(Answer::from_str("YES").is_err());
        assert!(Answer::from_str("maybe").is_err());
    }

    #[test]
    fn emits_canonical_only() {
        assert_eq!(Answer::Yes.to_string(), "yes");
        assert_eq!(Answer::Yes.as_str(), "yes");
        assert_eq!(serde_json::to_string(&Answer::Yes).unwrap(), "\"yes\"");
        assert_eq!(
            serde_json::from_str::<Answer>("\"aye\"").unwrap(),
            Answer::Yes,
        );
    }

    #[test]
    fn lists_all_variants() {
        assert_eq!(Answer::ALL, &[Answer::Yes, Answer::No]);
        assert_eq!(Answer::No.u8(), 2);
    }
}
