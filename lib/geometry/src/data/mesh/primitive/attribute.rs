use std::borrow::Cow;

use nalgebra::{Point2, Point3, Point4, Vector3};

use crate::{AttributeType, ComponentType};

/// The semantic of a primitive vertex attribute.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttributeUsage {
    Position,
    Normal,
    Tangent,
    Texcoord(u32),
    Color(u32),
    Joints(u32),
    Weights(u32),
    /// `_FEATURE_ID_n`, from `EXT_mesh_features`
    FeatureId(u32),
    /// Any other application-specific attribute (names starting with `_`).
    Custom(String),
}

impl AttributeUsage {
    pub fn to_gltf(&self) -> Cow<'static, str> {
        match self {
            Self::Position => Cow::Borrowed("POSITION"),
            Self::Normal => Cow::Borrowed("NORMAL"),
            Self::Tangent => Cow::Borrowed("TANGENT"),
            Self::Texcoord(n) => Cow::Owned(format!("TEXCOORD_{n}")),
            Self::Color(n) => Cow::Owned(format!("COLOR_{n}")),
            Self::Joints(n) => Cow::Owned(format!("JOINTS_{n}")),
            Self::Weights(n) => Cow::Owned(format!("WEIGHTS_{n}")),
            Self::FeatureId(n) => Cow::Owned(format!("_FEATURE_ID_{n}")),
            Self::Custom(name) => Cow::Owned(name.clone()),
        }
    }

    pub fn from_gltf(name: &str) -> Self {
        fn set(name: &str, prefix: &str) -> Option<u32> {
            name.strip_prefix(prefix)?.parse().ok()
        }
        match name {
            "POSITION" => Self::Position,
            "NORMAL" => Self::Normal,
            "TANGENT" => Self::Tangent,
            _ => {
                if let Some(n) = set(name, "TEXCOORD_") {
                    Self::Texcoord(n)
                } else if let Some(n) = set(name, "COLOR_") {
                    Self::Color(n)
                } else if let Some(n) = set(name, "JOINTS_") {
                    Self::Joints(n)
                } else if let Some(n) = set(name, "WEIGHTS_") {
                    Self::Weights(n)
                } else if let Some(n) = set(name, "_FEATURE_ID_") {
                    Self::FeatureId(n)
                } else {
                    Self::Custom(name.to_owned())
                }
            }
        }
    }
}

/// Component types which can be written into attribute data.
pub trait AttributeComponentType: Copy {
    const COMPONENT: ComponentType;
    fn write_le(self, out: &mut Vec<u8>);
}

/// Types which can be used as primitive attribute data.
///
/// Implementing types must have the size described by their `TYPE` and component type.
pub trait Attribute: Sized {
    const TYPE: AttributeType;
    type Component: AttributeComponentType;

    fn components(&self) -> &[Self::Component];

    /// Append the little-endian encoding of `self` to `out`.
    fn write_le(&self, out: &mut Vec<u8>) {
        for c in self.components() {
            c.write_le(out);
        }
    }
}

mod _impl_attr {
    use super::{Attribute, AttributeComponentType};
    use crate::{AttributeType, ComponentType};

    macro_rules! impl_attr_comp_type {
        ($Target:ident: $comp:expr) => {
            impl AttributeComponentType for $Target {
                const COMPONENT: ComponentType = $comp;
                #[inline]
                fn write_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }
            }
        };
    }

    impl_attr_comp_type!(u8: ComponentType::U8);
    impl_attr_comp_type!(u16: ComponentType::U16);
    impl_attr_comp_type!(u32: ComponentType::U32);
    impl_attr_comp_type!(i8: ComponentType::I8);
    impl_attr_comp_type!(i16: ComponentType::I16);
    impl_attr_comp_type!(f32: ComponentType::F32);

    macro_rules! impl_attr {
        ($t:ident<$($C:ty, $c:ident);+: $CAlias:ident> => $Target:ty, |$s:ident| $slice:expr) => {
            $( // for every ($C, $c)
               const _: () = { // anonymous module
                type $CAlias = $C;
                // "size of type $C == size of component $c"
                static_assertions::const_assert_eq!(std::mem::size_of::<$CAlias>(), ComponentType::$c.size());
                // "size of type $Target == size of attribute $t with component $c"
                static_assertions::const_assert_eq!(std::mem::size_of::<$Target>(), AttributeType::$t.size_bytes(ComponentType::$c));
                impl Attribute for $Target {
                    const TYPE: AttributeType = AttributeType::$t;
                    type Component = $CAlias;
                    #[inline]
                    fn components(&self) -> &[$CAlias] {
                        let $s = self;
                        $slice
                    }
                }
               };
            )+
        };
        ($t:ident<$CAlias:ident> => $Target:ty, |$s:ident| $slice:expr) => {
            impl_attr!($t<
                u8, U8;
                u16, U16;
                u32, U32;
                i8, I8;
                i16, I16;
                f32, F32: $CAlias> => $Target, |$s| $slice);
        };
    }

    impl_attr!(Scalar<C> => C, |s| std::slice::from_ref(s));

    impl_attr!(Vec2<C> => nalgebra::Vector2<C>, |s| s.as_slice());
    impl_attr!(Vec2<C> => nalgebra::Point2<C>, |s| s.coords.as_slice());
    impl_attr!(Vec2<C> => [C; 2], |s| s.as_slice());

    impl_attr!(Vec3<C> => nalgebra::Vector3<C>, |s| s.as_slice());
    impl_attr!(Vec3<C> => nalgebra::Point3<C>, |s| s.coords.as_slice());
    impl_attr!(Vec3<C> => [C; 3], |s| s.as_slice());

    impl_attr!(Vec4<C> => nalgebra::Vector4<C>, |s| s.as_slice());
    impl_attr!(Vec4<C> => nalgebra::Point4<C>, |s| s.coords.as_slice());
    impl_attr!(Vec4<C> => [C; 4], |s| s.as_slice());
}

pub type Position = Point3<f32>;
pub type Normal = Vector3<f32>;

pub type Texcoord<C> = Point2<C>; // gltf: u8 | u16 | f32
pub type Rgb<C> = Point3<C>; // gltf: u8 | u16 | f32
pub type Rgba<C> = Point4<C>; // gltf: u8 | u16 | f32
