/// Declares a configuration setting: a fieldless enum whose variants are
/// numbered from zero in declaration order, plus a checked conversion from
/// that raw number. A raw value at or past the variant count is rejected
/// instead of being mapped to some default.
macro_rules! setting {
    (
        $(#[$meta:meta])*
        $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                $variant,
            )+
        }

        impl $name {
            /// Every value, in raw encoding order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
        }

        impl TryFrom<u8> for $name {
            type Error = $crate::Error;

            fn try_from(value: u8) -> core::result::Result<Self, Self::Error> {
                Self::ALL.get(value as usize).copied().ok_or($crate::Error::InvalidSetting {
                    setting: stringify!($name),
                    value,
                })
            }
        }
    };
}

setting! {
    /// On/off setting shared by every enable-style field.
    State {
        Disabled,
        Enabled,
    }
}

impl State {
    pub(crate) fn bit(self) -> u8 {
        match self {
            State::Disabled => 0,
            State::Enabled => 1,
        }
    }
}
