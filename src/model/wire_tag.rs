use thiserror::Error;

/// A numeric enumeration tag received from the controller that has no known meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown {tag} tag: {value}")]
pub struct TagError {
    pub tag: &'static str,
    pub value: u8,
}

/// Defines an enum that travels as a plain integer on the wire.
///
/// The generated enum serializes into its numeric value and refuses unknown
/// numbers with a [`TagError`] instead of silently mapping them.
macro_rules! define_wire_tag {
    (
        $(#[$enum_attr:meta])*
        pub enum $enum_name:ident {
            $(
                $(#[$variant_attr:meta])*
                $variant:ident = $value:literal
            ),* $(,)?
        }
    ) => {
        $(#[$enum_attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(try_from = "u8", into = "u8")]
        pub enum $enum_name {
            $(
                $(#[$variant_attr])*
                $variant,
            )*
        }

        impl TryFrom<u8> for $enum_name {
            type Error = $crate::TagError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $(
                        $value => Ok(Self::$variant),
                    )*
                    other => Err($crate::TagError {
                        tag: stringify!($enum_name),
                        value: other,
                    }),
                }
            }
        }

        impl From<$enum_name> for u8 {
            fn from(tag: $enum_name) -> u8 {
                match tag {
                    $(
                        $enum_name::$variant => $value,
                    )*
                }
            }
        }
    };
}
