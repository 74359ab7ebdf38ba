// Declarative helpers that generate typed views and their accessors.
//
// Accessor macros expand inside an `impl` block of a type that has a `node: Node` field.

/// Declares an object view type.
macro_rules! mnx_object {
    ($(#[$meta:meta])* $vis:vis struct $name:ident;) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        $vis struct $name {
            node: $crate::base::Node,
        }

        impl $crate::base::View for $name {
            const SHAPE: $crate::base::Shape = $crate::base::Shape::Object;

            fn from_node(node: $crate::base::Node) -> Self {
                Self { node }
            }

            fn node(&self) -> &$crate::base::Node {
                &self.node
            }
        }

        impl $crate::base::Element for $name {
            fn load(node: $crate::base::Node) -> Result<Self, $crate::error::MnxError> {
                <Self as $crate::base::View>::bind(node)
            }
        }
    };
}

/// A required scalar: getter and setter, no clear.
macro_rules! required_property {
    ($(#[$meta:meta])* $get:ident, $set:ident, $ty:ty, $key:literal) => {
        $(#[$meta])*
        pub fn $get(&self) -> Result<$ty, $crate::error::MnxError> {
            self.node.required($key)
        }

        pub fn $set(&self, value: impl Into<$ty>) -> Result<(), $crate::error::MnxError> {
            self.node.set($key, &value.into())
        }
    };
}

/// An optional scalar: getter returning `Option`, setter and clear.
macro_rules! optional_property {
    ($(#[$meta:meta])* $get:ident, $set:ident, $clear:ident, $ty:ty, $key:literal) => {
        $(#[$meta])*
        pub fn $get(&self) -> Result<Option<$ty>, $crate::error::MnxError> {
            self.node.get($key)
        }

        pub fn $set(&self, value: impl Into<$ty>) -> Result<(), $crate::error::MnxError> {
            self.node.set($key, &value.into())
        }

        pub fn $clear(&self) -> Result<(), $crate::error::MnxError> {
            self.node.remove($key)
        }
    };
}

/// An optional scalar whose absence reads as a fixed default.
macro_rules! default_property {
    ($(#[$meta:meta])* $get:ident, $set:ident, $clear:ident, $ty:ty, $key:literal, $default:expr) => {
        $(#[$meta])*
        pub fn $get(&self) -> Result<$ty, $crate::error::MnxError> {
            Ok(self.node.get($key)?.unwrap_or($default))
        }

        pub fn $set(&self, value: impl Into<$ty>) -> Result<(), $crate::error::MnxError> {
            self.node.set($key, &value.into())
        }

        pub fn $clear(&self) -> Result<(), $crate::error::MnxError> {
            self.node.remove($key)
        }
    };
}

/// A required child view: getter and a create that replaces it with an empty node.
macro_rules! required_child {
    ($(#[$meta:meta])* $get:ident, $create:ident, $ty:ty, $key:literal) => {
        $(#[$meta])*
        pub fn $get(&self) -> Result<$ty, $crate::error::MnxError> {
            self.node.required_view($key)
        }

        pub fn $create(&self) -> Result<$ty, $crate::error::MnxError> {
            self.node.create_view($key)
        }
    };
}

/// An optional child view: getter returning `Option`, ensure and clear.
macro_rules! optional_child {
    ($(#[$meta:meta])* $get:ident, $ensure:ident, $clear:ident, $ty:ty, $key:literal) => {
        $(#[$meta])*
        pub fn $get(&self) -> Result<Option<$ty>, $crate::error::MnxError> {
            self.node.child_view($key)
        }

        pub fn $ensure(&self) -> Result<$ty, $crate::error::MnxError> {
            self.node.ensure_view($key)
        }

        pub fn $clear(&self) -> Result<(), $crate::error::MnxError> {
            self.node.remove($key)
        }
    };
}
