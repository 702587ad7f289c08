//! The runtime host boundary
//!
//! Everything the bridge needs from the hosted object model goes through
//! [`RuntimeHost`]. An embedded managed runtime implements it over its
//! embedding API; [`crate::mock::MockHost`] implements it in memory.
//!
//! # Value conventions
//!
//! - Primitive and enum values travel unboxed as the matching [`HostValue`]
//!   variant (enums as their underlying integer).
//! - Strings, arrays, lists, records and boxed values are [`HostValue::Object`].
//! - A missing reference is [`HostValue::Null`].
//! - Method results follow the same rules, so `get_Count` yields
//!   `HostValue::I32` and `get_Item` on a list of records yields an object.

use std::path::Path;

use mbinbridge_sdk::{
    AssemblyRef, AttributeInfo, ClassInfo, ClassRef, FieldInfo, FieldRef, HostValue, ObjectRef,
};

use crate::error::HostError;

/// Operations the bridge consumes from the hosted runtime
pub trait RuntimeHost {
    /// Load an assembly into the host and return a reference to it
    fn load_assembly(&self, path: &Path) -> Result<AssemblyRef, HostError>;

    /// Number of rows in the assembly's type definition table
    fn type_count(&self, assembly: AssemblyRef) -> Result<usize, HostError>;

    /// Resolve the type table row at `index`
    ///
    /// Rows the host cannot turn into a class fail with
    /// [`HostError::UnresolvableType`]; callers skip them.
    fn type_at(&self, assembly: AssemblyRef, index: usize) -> Result<ClassRef, HostError>;

    /// Find a class by namespace and simple name
    fn find_class(&self, namespace: &str, name: &str) -> Result<ClassRef, HostError>;

    fn class_info(&self, class: ClassRef) -> Result<ClassInfo, HostError>;

    /// Fields declared directly on `class`, in declaration order
    ///
    /// For enums this includes the backing field followed by the constants.
    fn class_fields(&self, class: ClassRef) -> Result<Vec<FieldRef>, HostError>;

    fn field_info(&self, field: FieldRef) -> Result<FieldInfo, HostError>;

    /// Constant value of a literal field (enum entries), `None` otherwise
    fn field_constant(&self, field: FieldRef) -> Result<Option<HostValue>, HostError>;

    /// Custom attributes attached to a field
    fn field_attributes(&self, field: FieldRef) -> Result<Vec<AttributeInfo>, HostError>;

    /// Element class of an array class
    ///
    /// Fails with [`HostError::NotAnArrayClass`] for any other class.
    fn array_element_class(&self, array_class: ClassRef) -> Result<ClassRef, HostError>;

    /// Declared class of parameter `index` of `class::method/arity`
    fn method_param_class(
        &self,
        class: ClassRef,
        method: &str,
        arity: usize,
        index: usize,
    ) -> Result<ClassRef, HostError>;

    /// Runtime class of an object
    fn object_class(&self, obj: ObjectRef) -> Result<ClassRef, HostError>;

    /// Allocate an instance without running any constructor
    fn new_object(&self, class: ClassRef) -> Result<ObjectRef, HostError>;

    /// Run the parameterless constructor on a freshly allocated object
    fn init_object(&self, obj: ObjectRef) -> Result<(), HostError>;

    /// Invoke `class::method` with `args`
    ///
    /// `target` is the receiver for instance methods and `None` for static
    /// ones. Exceptions thrown by the method surface as
    /// [`HostError::Exception`].
    fn invoke(
        &self,
        class: ClassRef,
        method: &str,
        target: Option<ObjectRef>,
        args: &[HostValue],
    ) -> Result<HostValue, HostError>;

    fn get_field(&self, obj: ObjectRef, field: FieldRef) -> Result<HostValue, HostError>;

    fn set_field(&self, obj: ObjectRef, field: FieldRef, value: HostValue)
        -> Result<(), HostError>;

    /// Create a host string
    fn new_string(&self, text: &str) -> Result<ObjectRef, HostError>;

    /// Read a host string as UTF-8
    fn read_string(&self, obj: ObjectRef) -> Result<String, HostError>;

    /// Allocate an array of `len` default elements
    fn new_array(&self, element_class: ClassRef, len: usize) -> Result<ObjectRef, HostError>;

    fn array_len(&self, array: ObjectRef) -> Result<usize, HostError>;

    fn array_get(&self, array: ObjectRef, index: usize) -> Result<HostValue, HostError>;

    fn array_set(&self, array: ObjectRef, index: usize, value: HostValue)
        -> Result<(), HostError>;

    /// Box a value-type value as an instance of `class`
    fn box_value(&self, class: ClassRef, value: HostValue) -> Result<ObjectRef, HostError>;

    /// Unbox a boxed value
    fn unbox(&self, obj: ObjectRef) -> Result<HostValue, HostError>;
}
