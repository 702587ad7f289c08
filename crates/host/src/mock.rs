//! In-memory runtime host
//!
//! `MockHost` models just enough of the managed asset library for the bridge
//! to run against it without a real runtime: a type table, records with typed
//! fields, enums with constants, arrays, generic lists with their
//! `get_Count`/`get_Item`/`Clear`/`Add` members, boxing, and the
//! `LoadFile`/`WriteToMbin`/`WriteToExml` entry points (which store deep
//! copies in an in-memory file table instead of touching disk).
//!
//! The mock is cheap to clone; clones share state, so a test can hand one
//! clone to a [`crate::HostSession`] and keep another for setup and
//! inspection.
//!
//! Field writes are type-checked the way the host's field setters would be,
//! so marshalling code that hands the wrong kind of value to a field fails
//! loudly instead of silently corrupting the object.

use std::collections::HashMap;
use std::mem::discriminant;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use slotmap::{DefaultKey, Key, KeyData, SlotMap};

use mbinbridge_sdk::{
    names, AssemblyRef, AttributeInfo, ClassInfo, ClassRef, FieldInfo, FieldRef, HostException,
    HostValue, IntWidth, ObjectRef, PrimitiveType,
};

use crate::error::HostError;
use crate::runtime::RuntimeHost;

const LIST_NAMESPACE: &str = "System.Collections.Generic";
const LIST_NAME: &str = "List`1";
const HASHMAP_NAMESPACE: &str = "libMBIN.NMS";
const HASHMAP_NAME: &str = "HashMap`1";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ClassKind {
    Primitive(PrimitiveType),
    /// `System.Object`
    Object,
    Record,
    Enum(IntWidth),
    List(ClassRef),
    Array(ClassRef),
}

struct MockClass {
    info: ClassInfo,
    kind: ClassKind,
    /// Name as it appears in field type names
    type_name: String,
    fields: Vec<FieldRef>,
}

struct MockField {
    owner: ClassRef,
    info: FieldInfo,
    constant: Option<HostValue>,
    attributes: Vec<AttributeInfo>,
}

#[derive(Clone)]
enum MockObject {
    Instance {
        class: ClassRef,
        fields: HashMap<FieldRef, HostValue>,
    },
    Str(String),
    Array {
        class: ClassRef,
        items: Vec<HostValue>,
    },
    /// `items` is `None` until the constructor has run
    List {
        class: ClassRef,
        items: Option<Vec<HostValue>>,
    },
    Boxed {
        class: ClassRef,
        value: HostValue,
    },
}

enum TypeRow {
    Class(ClassRef),
    Unresolvable(String),
}

struct Failure {
    class: ClassRef,
    method: String,
    /// Fail only this call (0-based); every call when `None`
    on_call: Option<usize>,
    exception: HostException,
}

#[derive(Default)]
struct MockState {
    classes: Vec<MockClass>,
    fields: Vec<MockField>,
    objects: SlotMap<DefaultKey, MockObject>,
    type_table: Vec<TypeRow>,
    loaded: Option<PathBuf>,
    primitives: HashMap<PrimitiveType, ClassRef>,
    object_class: Option<ClassRef>,
    template_class: Option<ClassRef>,
    failures: Vec<Failure>,
    calls: HashMap<(ClassRef, String), usize>,
    lookups: HashMap<(String, String), usize>,
    /// Classes whose member metadata queries fail
    broken: Vec<ClassRef>,
    files: HashMap<PathBuf, ObjectRef>,
    writes: Vec<(String, PathBuf)>,
}

/// Shared in-memory host
#[derive(Clone)]
pub struct MockHost {
    state: Arc<RwLock<MockState>>,
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHost {
    /// Create a host with the `System` primitives, the root template class,
    /// the file-IO class and the open generic map definition registered
    pub fn new() -> Self {
        let host = Self {
            state: Arc::new(RwLock::new(MockState::default())),
        };

        {
            let mut state = host.state.write();
            for primitive in PrimitiveType::ALL {
                let (namespace, name) = split_name(primitive.host_name());
                let class = state.push_class(
                    class_info(namespace, name),
                    ClassKind::Primitive(primitive),
                    primitive.host_name().to_string(),
                );
                state.primitives.insert(primitive, class);
            }

            let object = state.push_class(
                class_info("System", "Object"),
                ClassKind::Object,
                "System.Object".to_string(),
            );
            state.object_class = Some(object);
        }

        let template = host.define_class(names::ROOT_NAMESPACE, names::TEMPLATE_CLASS);
        host.set_parent(template, host.object());
        host.state.write().template_class = Some(template);

        let file_io = host.define_class(names::ROOT_NAMESPACE, names::FILE_IO_CLASS);
        host.set_parent(file_io, host.object());

        let hashmap = host.define_class(HASHMAP_NAMESPACE, HASHMAP_NAME);
        host.set_parent(hashmap, host.object());

        host
    }

    // ========================================================================
    // Type definition
    // ========================================================================

    /// Class of a primitive type
    pub fn primitive(&self, primitive: PrimitiveType) -> ClassRef {
        self.state.read().primitives[&primitive]
    }

    /// `System.Object`
    pub fn object(&self) -> ClassRef {
        self.state.read().object_class.unwrap_or(ClassRef::from_raw(0))
    }

    /// The root template class
    pub fn template(&self) -> ClassRef {
        self.state.read().template_class.unwrap_or(ClassRef::from_raw(0))
    }

    /// Define a record class deriving from the root template class
    pub fn define_class(&self, namespace: &str, name: &str) -> ClassRef {
        let mut state = self.state.write();
        let mut info = class_info(namespace, name);
        info.parent = state.template_class;
        let class = state.push_class(info, ClassKind::Record, format!("{namespace}.{name}"));
        state.type_table.push(TypeRow::Class(class));
        class
    }

    /// Define a record class nested inside `outer`
    pub fn define_nested_class(&self, outer: ClassRef, name: &str) -> ClassRef {
        let mut state = self.state.write();
        let mut info = class_info("", name);
        info.parent = state.template_class;
        info.nesting = Some(outer);
        let type_name = format!("{}/{}", state.class(outer).type_name, name);
        let class = state.push_class(info, ClassKind::Record, type_name);
        state.type_table.push(TypeRow::Class(class));
        class
    }

    /// Define a top-level enum
    pub fn define_enum(
        &self,
        namespace: &str,
        name: &str,
        width: IntWidth,
        entries: &[(&str, i64)],
    ) -> ClassRef {
        self.push_enum(class_info(namespace, name), format!("{namespace}.{name}"), width, entries)
    }

    /// Define an enum nested inside `outer`
    pub fn define_nested_enum(
        &self,
        outer: ClassRef,
        name: &str,
        width: IntWidth,
        entries: &[(&str, i64)],
    ) -> ClassRef {
        let mut info = class_info("", name);
        info.nesting = Some(outer);
        let type_name = format!("{}/{}", self.state.read().class(outer).type_name, name);
        self.push_enum(info, type_name, width, entries)
    }

    fn push_enum(
        &self,
        mut info: ClassInfo,
        type_name: String,
        width: IntWidth,
        entries: &[(&str, i64)],
    ) -> ClassRef {
        let backing = self.primitive(width_primitive(width));
        let mut state = self.state.write();
        info.is_enum = true;
        let class = state.push_class(info, ClassKind::Enum(width), type_name);
        state.type_table.push(TypeRow::Class(class));

        state.push_field(class, names::ENUM_BACKING_FIELD, backing, None);
        for (name, value) in entries {
            state.push_field(class, name, class, Some(HostValue::integral(width, *value)));
        }
        class
    }

    /// Replace the direct base class
    pub fn set_parent(&self, class: ClassRef, parent: ClassRef) {
        self.state.write().class_mut(class).info.parent = Some(parent);
    }

    /// Remove the direct base class
    pub fn clear_parent(&self, class: ClassRef) {
        self.state.write().class_mut(class).info.parent = None;
    }

    /// Add an instance field
    pub fn add_field(&self, class: ClassRef, name: &str, field_type: ClassRef) -> FieldRef {
        self.state.write().push_field(class, name, field_type, None)
    }

    /// Add an instance field carrying a size attribute
    pub fn add_sized_field(
        &self,
        class: ClassRef,
        name: &str,
        field_type: ClassRef,
        size: i32,
    ) -> FieldRef {
        let field = self.add_field(class, name, field_type);
        self.add_attribute(
            field,
            AttributeInfo {
                class_name: names::SIZE_ATTRIBUTE.to_string(),
                properties: vec![(names::SIZE_PROPERTY.to_string(), HostValue::I32(size))],
            },
        );
        field
    }

    /// Attach an attribute to a field
    pub fn add_attribute(&self, field: FieldRef, attribute: AttributeInfo) {
        self.state.write().field_mut(field).attributes.push(attribute);
    }

    /// Generic list class over `element`
    pub fn list_of(&self, element: ClassRef) -> ClassRef {
        self.generic_list(LIST_NAMESPACE, LIST_NAME, names::LIST_MARKER, element)
    }

    /// Fixed-map class over `element` (a list on the host side)
    pub fn hashmap_of(&self, element: ClassRef) -> ClassRef {
        self.generic_list(HASHMAP_NAMESPACE, HASHMAP_NAME, names::HASHMAP_MARKER, element)
    }

    fn generic_list(&self, namespace: &str, name: &str, marker: &str, element: ClassRef) -> ClassRef {
        let mut state = self.state.write();
        let type_name = format!("{marker}`1<{}>", state.class(element).type_name);
        if let Some(existing) = state.class_by_type_name(&type_name) {
            return existing;
        }
        let mut info = class_info(namespace, name);
        info.parent = state.object_class;
        state.push_class(info, ClassKind::List(element), type_name)
    }

    /// Array class over `element`
    pub fn array_of(&self, element: ClassRef) -> ClassRef {
        self.state.write().array_class(element)
    }

    /// Add a type table row the host cannot resolve
    pub fn add_unresolvable_type(&self, name: &str) {
        self.state
            .write()
            .type_table
            .push(TypeRow::Unresolvable(name.to_string()));
    }

    /// Make every call to `class::method` throw `exception`
    pub fn fail_method(&self, class: ClassRef, method: &str, exception: HostException) {
        self.state.write().failures.push(Failure {
            class,
            method: method.to_string(),
            on_call: None,
            exception,
        });
    }

    /// Make only call number `call` (0-based) to `class::method` throw
    pub fn fail_method_on_call(
        &self,
        class: ClassRef,
        method: &str,
        call: usize,
        exception: HostException,
    ) {
        self.state.write().failures.push(Failure {
            class,
            method: method.to_string(),
            on_call: Some(call),
            exception,
        });
    }

    /// Make array and method metadata queries on `class` fail
    pub fn break_metadata(&self, class: ClassRef) {
        self.state.write().broken.push(class);
    }

    // ========================================================================
    // Object setup and inspection
    // ========================================================================

    /// Allocate a constructed instance
    pub fn instantiate(&self, class: ClassRef) -> ObjectRef {
        let mut state = self.state.write();
        let obj = state.allocate(class);
        if let Some(MockObject::List { items, .. }) = state.object_mut(obj) {
            *items = Some(Vec::new());
        }
        obj
    }

    /// Set a field by name, bypassing type checks
    pub fn set(&self, obj: ObjectRef, field_name: &str, value: HostValue) {
        let mut state = self.state.write();
        let field = state.field_by_name(obj, field_name);
        if let Some(MockObject::Instance { fields, .. }) = state.object_mut(obj) {
            fields.insert(field, value);
        }
    }

    /// Read a field by name
    pub fn get(&self, obj: ObjectRef, field_name: &str) -> HostValue {
        let state = self.state.read();
        let field = state.field_by_name(obj, field_name);
        match state.object(obj) {
            Some(MockObject::Instance { fields, .. }) => fields[&field],
            _ => HostValue::Null,
        }
    }

    /// Create a constructed list holding `items`
    pub fn new_list(&self, list_class: ClassRef, items: Vec<HostValue>) -> ObjectRef {
        let mut state = self.state.write();
        state.objects.insert(MockObject::List {
            class: list_class,
            items: Some(items),
        }).into_ref()
    }

    /// Create an array of `element` holding `items`
    pub fn new_array_with(&self, element: ClassRef, items: Vec<HostValue>) -> ObjectRef {
        let mut state = self.state.write();
        let class = state.array_class(element);
        state.objects.insert(MockObject::Array { class, items }).into_ref()
    }

    /// Create a string object
    pub fn string(&self, text: &str) -> ObjectRef {
        self.state
            .write()
            .objects
            .insert(MockObject::Str(text.to_string()))
            .into_ref()
    }

    /// Items of a list or array (`None` for anything else, or an unconstructed list)
    pub fn items(&self, obj: ObjectRef) -> Option<Vec<HostValue>> {
        match self.state.read().object(obj)? {
            MockObject::List { items, .. } => items.clone(),
            MockObject::Array { items, .. } => Some(items.clone()),
            _ => None,
        }
    }

    /// Contents of a string object
    pub fn text(&self, obj: ObjectRef) -> Option<String> {
        match self.state.read().object(obj)? {
            MockObject::Str(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// Store a deep copy of `obj` as the content of file `path`
    pub fn store_file(&self, path: impl AsRef<Path>, obj: ObjectRef) {
        let mut state = self.state.write();
        let copy = state.deep_copy(obj);
        state.files.insert(path.as_ref().to_path_buf(), copy);
    }

    /// Object stored for `path` by a previous write
    pub fn stored_file(&self, path: impl AsRef<Path>) -> Option<ObjectRef> {
        self.state.read().files.get(path.as_ref()).copied()
    }

    /// Every `WriteTo*` call so far, as (method, path)
    pub fn writes(&self) -> Vec<(String, PathBuf)> {
        self.state.read().writes.clone()
    }

    /// Number of invocations of `class::method`
    pub fn call_count(&self, class: ClassRef, method: &str) -> usize {
        self.state
            .read()
            .calls
            .get(&(class, method.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Number of `find_class` calls for `namespace.name`
    pub fn lookup_count(&self, namespace: &str, name: &str) -> usize {
        self.state
            .read()
            .lookups
            .get(&(namespace.to_string(), name.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Number of live objects
    pub fn object_count(&self) -> usize {
        self.state.read().objects.len()
    }
}

impl RuntimeHost for MockHost {
    fn load_assembly(&self, path: &Path) -> Result<AssemblyRef, HostError> {
        self.state.write().loaded = Some(path.to_path_buf());
        Ok(AssemblyRef::from_raw(1))
    }

    fn type_count(&self, assembly: AssemblyRef) -> Result<usize, HostError> {
        let state = self.state.read();
        state.check_assembly(assembly)?;
        Ok(state.type_table.len())
    }

    fn type_at(&self, assembly: AssemblyRef, index: usize) -> Result<ClassRef, HostError> {
        let state = self.state.read();
        state.check_assembly(assembly)?;
        match state.type_table.get(index) {
            Some(TypeRow::Class(class)) => Ok(*class),
            Some(TypeRow::Unresolvable(name)) => Err(HostError::UnresolvableType(name.clone())),
            None => Err(HostError::IndexOutOfRange {
                index,
                len: state.type_table.len(),
            }),
        }
    }

    fn find_class(&self, namespace: &str, name: &str) -> Result<ClassRef, HostError> {
        let mut state = self.state.write();
        *state
            .lookups
            .entry((namespace.to_string(), name.to_string()))
            .or_default() += 1;

        // Nested classes are addressed as `Outer/Inner` (or `Outer+Inner`).
        let mut segments = name.split(['/', '+']);
        let outer = segments.next().unwrap_or(name);
        let found = state.top_level_class(namespace, outer).and_then(|outer| {
            segments.try_fold(outer, |enclosing, inner| state.nested_class(enclosing, inner))
        });

        found.ok_or_else(|| HostError::ClassNotFound {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }

    fn class_info(&self, class: ClassRef) -> Result<ClassInfo, HostError> {
        Ok(self.state.read().try_class(class)?.info.clone())
    }

    fn class_fields(&self, class: ClassRef) -> Result<Vec<FieldRef>, HostError> {
        Ok(self.state.read().try_class(class)?.fields.clone())
    }

    fn field_info(&self, field: FieldRef) -> Result<FieldInfo, HostError> {
        Ok(self.state.read().try_field(field)?.info.clone())
    }

    fn field_constant(&self, field: FieldRef) -> Result<Option<HostValue>, HostError> {
        Ok(self.state.read().try_field(field)?.constant)
    }

    fn field_attributes(&self, field: FieldRef) -> Result<Vec<AttributeInfo>, HostError> {
        Ok(self.state.read().try_field(field)?.attributes.clone())
    }

    fn array_element_class(&self, array_class: ClassRef) -> Result<ClassRef, HostError> {
        let state = self.state.read();
        state.check_metadata(array_class)?;
        match state.try_class(array_class)?.kind {
            ClassKind::Array(element) => Ok(element),
            _ => Err(HostError::NotAnArrayClass(state.class(array_class).type_name.clone())),
        }
    }

    fn method_param_class(
        &self,
        class: ClassRef,
        method: &str,
        arity: usize,
        index: usize,
    ) -> Result<ClassRef, HostError> {
        let state = self.state.read();
        state.check_metadata(class)?;
        let mock = state.try_class(class)?;
        match (mock.kind, method, arity, index) {
            (ClassKind::List(element), names::ADD, 1, 0) => Ok(element),
            (ClassKind::List(_), names::GET_ITEM, 1, 0) => Ok(state.primitives[&PrimitiveType::I32]),
            _ => Err(HostError::MethodNotFound {
                class: mock.type_name.clone(),
                method: method.to_string(),
                arity,
            }),
        }
    }

    fn object_class(&self, obj: ObjectRef) -> Result<ClassRef, HostError> {
        let state = self.state.read();
        Ok(match state.try_object(obj)? {
            MockObject::Instance { class, .. }
            | MockObject::Array { class, .. }
            | MockObject::List { class, .. }
            | MockObject::Boxed { class, .. } => *class,
            MockObject::Str(_) => state.primitives[&PrimitiveType::String],
        })
    }

    fn new_object(&self, class: ClassRef) -> Result<ObjectRef, HostError> {
        let mut state = self.state.write();
        let kind = state.try_class(class)?.kind;
        match kind {
            ClassKind::Array(_) => Err(HostError::mismatch("non-array class", "array class")),
            ClassKind::Primitive(PrimitiveType::String) => {
                Err(HostError::mismatch("non-string class", "System.String"))
            }
            _ => Ok(state.allocate(class)),
        }
    }

    fn init_object(&self, obj: ObjectRef) -> Result<(), HostError> {
        let mut state = self.state.write();
        let class = match state.try_object(obj)? {
            MockObject::Instance { class, .. }
            | MockObject::List { class, .. }
            | MockObject::Boxed { class, .. } => *class,
            _ => return Err(HostError::mismatch("constructible object", "array or string")),
        };
        state.record_call(class, names::CTOR)?;

        if let Some(MockObject::List { items, .. }) = state.object_mut(obj) {
            *items = Some(Vec::new());
        }
        Ok(())
    }

    fn invoke(
        &self,
        class: ClassRef,
        method: &str,
        target: Option<ObjectRef>,
        args: &[HostValue],
    ) -> Result<HostValue, HostError> {
        let mut state = self.state.write();
        let kind = state.try_class(class)?.kind;
        state.record_call(class, method)?;

        match (kind, method) {
            (ClassKind::List(element), names::GET_COUNT | names::GET_ITEM | names::CLEAR | names::ADD) => {
                let list = target.ok_or_else(|| HostError::NullReference(method.to_string()))?;
                state.invoke_list(list, element, method, args)
            }
            (_, names::LOAD_FILE) if state.is_file_io(class) => {
                let path = state.path_arg(args)?;
                let stored = state.files.get(&path).copied();
                match stored {
                    Some(stored) => Ok(HostValue::Object(state.deep_copy(stored))),
                    None => Err(HostException::new(
                        "System.IO.FileNotFoundException",
                        format!("Could not find file '{}'", path.display()),
                    )
                    .into()),
                }
            }
            (_, names::WRITE_MBIN | names::WRITE_EXML) if Some(class) == state.template_class => {
                let obj = target.ok_or_else(|| HostError::NullReference(method.to_string()))?;
                let obj_class = match state.try_object(obj)? {
                    MockObject::Instance { class: c, .. } => *c,
                    _ => return Err(HostError::mismatch("template instance", "non-record object")),
                };
                if !state.derives_from(obj_class, class) {
                    return Err(HostException::new(
                        "System.InvalidCastException",
                        format!("{} is not an {}", state.class(obj_class).type_name, names::TEMPLATE_CLASS),
                    )
                    .into());
                }
                let path = state.path_arg(args)?;
                let copy = state.deep_copy(obj);
                state.files.insert(path.clone(), copy);
                state.writes.push((method.to_string(), path));
                Ok(HostValue::Null)
            }
            _ => Err(HostError::MethodNotFound {
                class: state.class(class).type_name.clone(),
                method: method.to_string(),
                arity: args.len(),
            }),
        }
    }

    fn get_field(&self, obj: ObjectRef, field: FieldRef) -> Result<HostValue, HostError> {
        let state = self.state.read();
        let owner = state.try_field(field)?.owner;
        match state.try_object(obj)? {
            MockObject::Instance { class, fields } if *class == owner => {
                Ok(fields.get(&field).copied().unwrap_or(HostValue::Null))
            }
            _ => Err(HostError::UnknownField(field)),
        }
    }

    fn set_field(&self, obj: ObjectRef, field: FieldRef, value: HostValue) -> Result<(), HostError> {
        let mut state = self.state.write();
        let mock_field = state.try_field(field)?;
        let (owner, field_type) = (mock_field.owner, mock_field.info.type_class);
        if let Some(field_type) = field_type {
            if !state.accepts(field_type, &value) {
                return Err(HostError::mismatch(
                    state.class(field_type).type_name.clone(),
                    value.kind_name(),
                ));
            }
        }
        match state.object_mut(obj) {
            Some(MockObject::Instance { class, fields }) if *class == owner => {
                fields.insert(field, value);
                Ok(())
            }
            Some(_) => Err(HostError::UnknownField(field)),
            None => Err(HostError::UnknownObject(obj)),
        }
    }

    fn new_string(&self, text: &str) -> Result<ObjectRef, HostError> {
        Ok(self.string(text))
    }

    fn read_string(&self, obj: ObjectRef) -> Result<String, HostError> {
        match self.state.read().try_object(obj)? {
            MockObject::Str(s) => Ok(s.clone()),
            _ => Err(HostError::mismatch("System.String", "object")),
        }
    }

    fn new_array(&self, element_class: ClassRef, len: usize) -> Result<ObjectRef, HostError> {
        let mut state = self.state.write();
        state.try_class(element_class)?;
        let class = state.array_class(element_class);
        let items = vec![state.default_value(element_class); len];
        Ok(state.objects.insert(MockObject::Array { class, items }).into_ref())
    }

    fn array_len(&self, array: ObjectRef) -> Result<usize, HostError> {
        match self.state.read().try_object(array)? {
            MockObject::Array { items, .. } => Ok(items.len()),
            _ => Err(HostError::NotAnArray(array)),
        }
    }

    fn array_get(&self, array: ObjectRef, index: usize) -> Result<HostValue, HostError> {
        match self.state.read().try_object(array)? {
            MockObject::Array { items, .. } => {
                items.get(index).copied().ok_or(HostError::IndexOutOfRange {
                    index,
                    len: items.len(),
                })
            }
            _ => Err(HostError::NotAnArray(array)),
        }
    }

    fn array_set(&self, array: ObjectRef, index: usize, value: HostValue) -> Result<(), HostError> {
        let mut state = self.state.write();
        let class = match state.try_object(array)? {
            MockObject::Array { class, .. } => *class,
            _ => return Err(HostError::NotAnArray(array)),
        };
        let ClassKind::Array(element) = state.class(class).kind else {
            return Err(HostError::NotAnArray(array));
        };
        if !state.accepts(element, &value) {
            return Err(HostError::mismatch(
                state.class(element).type_name.clone(),
                value.kind_name(),
            ));
        }
        match state.object_mut(array) {
            Some(MockObject::Array { items, .. }) => {
                let len = items.len();
                let slot = items
                    .get_mut(index)
                    .ok_or(HostError::IndexOutOfRange { index, len })?;
                *slot = value;
                Ok(())
            }
            _ => Err(HostError::NotAnArray(array)),
        }
    }

    fn box_value(&self, class: ClassRef, value: HostValue) -> Result<ObjectRef, HostError> {
        let mut state = self.state.write();
        let kind = state.try_class(class)?.kind;
        match kind {
            ClassKind::Primitive(_) | ClassKind::Enum(_)
                if kind != ClassKind::Primitive(PrimitiveType::String)
                    && state.accepts(class, &value) =>
            {
                Ok(state.objects.insert(MockObject::Boxed { class, value }).into_ref())
            }
            _ => Err(HostError::mismatch(
                state.class(class).type_name.clone(),
                value.kind_name(),
            )),
        }
    }

    fn unbox(&self, obj: ObjectRef) -> Result<HostValue, HostError> {
        match self.state.read().try_object(obj)? {
            MockObject::Boxed { value, .. } => Ok(*value),
            _ => Err(HostError::mismatch("boxed value", "object")),
        }
    }
}

impl MockState {
    fn push_class(&mut self, info: ClassInfo, kind: ClassKind, type_name: String) -> ClassRef {
        self.classes.push(MockClass {
            info,
            kind,
            type_name,
            fields: Vec::new(),
        });
        class_ref(self.classes.len() - 1)
    }

    fn push_field(
        &mut self,
        owner: ClassRef,
        name: &str,
        field_type: ClassRef,
        constant: Option<HostValue>,
    ) -> FieldRef {
        let type_name = self.class(field_type).type_name.clone();
        self.fields.push(MockField {
            owner,
            info: FieldInfo {
                name: name.to_string(),
                type_name,
                type_class: Some(field_type),
            },
            constant,
            attributes: Vec::new(),
        });
        let field = FieldRef::from_raw(self.fields.len() as u64);
        self.class_mut(owner).fields.push(field);
        field
    }

    fn array_class(&mut self, element: ClassRef) -> ClassRef {
        let type_name = format!("{}[]", self.class(element).type_name);
        if let Some(existing) = self.class_by_type_name(&type_name) {
            return existing;
        }
        let element_info = &self.class(element).info;
        let mut info = class_info(&element_info.namespace, &format!("{}[]", element_info.name));
        info.parent = self.object_class;
        self.push_class(info, ClassKind::Array(element), type_name)
    }

    fn class_by_type_name(&self, type_name: &str) -> Option<ClassRef> {
        self.classes
            .iter()
            .position(|c| c.type_name == type_name)
            .map(class_ref)
    }

    fn top_level_class(&self, namespace: &str, name: &str) -> Option<ClassRef> {
        self.classes
            .iter()
            .position(|c| {
                c.info.namespace == namespace
                    && c.info.name == name
                    && c.info.nesting.is_none()
                    && !matches!(c.kind, ClassKind::List(_) | ClassKind::Array(_))
            })
            .map(class_ref)
    }

    fn nested_class(&self, enclosing: ClassRef, name: &str) -> Option<ClassRef> {
        self.classes
            .iter()
            .position(|c| c.info.nesting == Some(enclosing) && c.info.name == name)
            .map(class_ref)
    }

    fn try_class(&self, class: ClassRef) -> Result<&MockClass, HostError> {
        (class.raw() as usize)
            .checked_sub(1)
            .and_then(|i| self.classes.get(i))
            .ok_or(HostError::UnknownClass(class))
    }

    fn class(&self, class: ClassRef) -> &MockClass {
        &self.classes[class.raw() as usize - 1]
    }

    fn class_mut(&mut self, class: ClassRef) -> &mut MockClass {
        &mut self.classes[class.raw() as usize - 1]
    }

    fn try_field(&self, field: FieldRef) -> Result<&MockField, HostError> {
        (field.raw() as usize)
            .checked_sub(1)
            .and_then(|i| self.fields.get(i))
            .ok_or(HostError::UnknownField(field))
    }

    fn field_mut(&mut self, field: FieldRef) -> &mut MockField {
        &mut self.fields[field.raw() as usize - 1]
    }

    fn field_by_name(&self, obj: ObjectRef, name: &str) -> FieldRef {
        let class = match self.object(obj) {
            Some(MockObject::Instance { class, .. }) => *class,
            _ => panic!("{obj} is not a record instance"),
        };
        self.class(class)
            .fields
            .iter()
            .copied()
            .find(|f| self.fields[f.raw() as usize - 1].info.name == name)
            .unwrap_or_else(|| panic!("no field {name} on {}", self.class(class).type_name))
    }

    fn object(&self, obj: ObjectRef) -> Option<&MockObject> {
        self.objects.get(object_key(obj))
    }

    fn object_mut(&mut self, obj: ObjectRef) -> Option<&mut MockObject> {
        self.objects.get_mut(object_key(obj))
    }

    fn try_object(&self, obj: ObjectRef) -> Result<&MockObject, HostError> {
        self.object(obj).ok_or(HostError::UnknownObject(obj))
    }

    fn check_metadata(&self, class: ClassRef) -> Result<(), HostError> {
        if self.broken.contains(&class) {
            return Err(HostError::Exception(HostException::new(
                "System.TypeLoadException",
                format!("metadata for {class} is unavailable"),
            )));
        }
        Ok(())
    }

    fn check_assembly(&self, assembly: AssemblyRef) -> Result<(), HostError> {
        match &self.loaded {
            Some(_) if assembly.raw() == 1 => Ok(()),
            _ => Err(HostError::AssemblyLoad {
                path: assembly.to_string(),
                reason: "assembly not loaded".to_string(),
            }),
        }
    }

    fn is_file_io(&self, class: ClassRef) -> bool {
        let info = &self.class(class).info;
        info.namespace == names::ROOT_NAMESPACE && info.name == names::FILE_IO_CLASS
    }

    fn derives_from(&self, class: ClassRef, ancestor: ClassRef) -> bool {
        std::iter::successors(Some(class), |c| self.class(*c).info.parent).any(|c| c == ancestor)
    }

    fn default_value(&self, class: ClassRef) -> HostValue {
        match self.class(class).kind {
            ClassKind::Primitive(primitive) => primitive.default_value(),
            ClassKind::Enum(width) => HostValue::integral(width, 0),
            _ => HostValue::Null,
        }
    }

    /// Whether a slot of type `class` can hold `value`
    fn accepts(&self, class: ClassRef, value: &HostValue) -> bool {
        match self.class(class).kind {
            ClassKind::Primitive(PrimitiveType::String) => match value {
                HostValue::Null => true,
                HostValue::Object(obj) => matches!(self.object(*obj), Some(MockObject::Str(_))),
                _ => false,
            },
            ClassKind::Primitive(primitive) => {
                discriminant(&primitive.default_value()) == discriminant(value)
            }
            ClassKind::Enum(width) => IntWidth::of(value) == Some(width),
            ClassKind::Object => matches!(value, HostValue::Null | HostValue::Object(_)),
            ClassKind::Record | ClassKind::List(_) | ClassKind::Array(_) => match value {
                HostValue::Null => true,
                HostValue::Object(obj) => {
                    let obj_class = match self.object(*obj) {
                        Some(
                            MockObject::Instance { class, .. }
                            | MockObject::List { class, .. }
                            | MockObject::Array { class, .. },
                        ) => *class,
                        _ => return false,
                    };
                    self.derives_from(obj_class, class)
                }
                _ => false,
            },
        }
    }

    fn allocate(&mut self, class: ClassRef) -> ObjectRef {
        let object = match self.class(class).kind {
            ClassKind::List(_) => MockObject::List { class, items: None },
            ClassKind::Primitive(_) | ClassKind::Enum(_) => MockObject::Boxed {
                class,
                value: self.default_value(class),
            },
            _ => {
                let fields = self
                    .class(class)
                    .fields
                    .iter()
                    .map(|f| {
                        let field_type = self.fields[f.raw() as usize - 1].info.type_class;
                        let value = field_type.map_or(HostValue::Null, |t| self.default_value(t));
                        (*f, value)
                    })
                    .collect();
                MockObject::Instance { class, fields }
            }
        };
        self.objects.insert(object).into_ref()
    }

    fn record_call(&mut self, class: ClassRef, method: &str) -> Result<(), HostError> {
        let count = self.calls.entry((class, method.to_string())).or_default();
        let call = *count;
        *count += 1;

        let failure = self.failures.iter().find(|f| {
            f.class == class && f.method == method && f.on_call.map_or(true, |n| n == call)
        });
        match failure {
            Some(f) => Err(HostError::Exception(f.exception.clone())),
            None => Ok(()),
        }
    }

    fn path_arg(&self, args: &[HostValue]) -> Result<PathBuf, HostError> {
        match args {
            [HostValue::Object(obj)] => match self.try_object(*obj)? {
                MockObject::Str(s) => Ok(PathBuf::from(s)),
                _ => Err(HostError::mismatch("System.String", "object")),
            },
            [other] => Err(HostError::mismatch("System.String", other.kind_name())),
            _ => Err(HostError::mismatch("1 argument", format!("{} arguments", args.len()))),
        }
    }

    fn invoke_list(
        &mut self,
        list: ObjectRef,
        element: ClassRef,
        method: &str,
        args: &[HostValue],
    ) -> Result<HostValue, HostError> {
        // Boxed arguments are stored unboxed, like the runtime's typed storage.
        let arg = match args.first() {
            Some(HostValue::Object(obj)) => match self.object(*obj) {
                Some(MockObject::Boxed { value, .. }) => Some(*value),
                _ => Some(HostValue::Object(*obj)),
            },
            other => other.copied(),
        };
        let accepted = arg.is_some_and(|v| self.accepts(element, &v));
        let element_name = self.class(element).type_name.clone();

        let items = match self.object_mut(list) {
            Some(MockObject::List { items: Some(items), .. }) => items,
            Some(MockObject::List { items: None, .. }) => {
                return Err(HostException::new(
                    "System.NullReferenceException",
                    "Object reference not set to an instance of an object",
                )
                .into())
            }
            _ => return Err(HostError::mismatch("list", "object")),
        };

        match method {
            names::GET_COUNT => Ok(HostValue::I32(items.len() as i32)),
            names::CLEAR => {
                items.clear();
                Ok(HostValue::Null)
            }
            names::GET_ITEM => {
                let index = match arg {
                    Some(HostValue::I32(i)) => i,
                    _ => return Err(HostError::mismatch("System.Int32", "argument")),
                };
                usize::try_from(index)
                    .ok()
                    .and_then(|i| items.get(i).copied())
                    .ok_or_else(|| {
                        HostException::new(
                            "System.ArgumentOutOfRangeException",
                            "Index was out of range. Must be non-negative and less than the size of the collection.",
                        )
                        .into()
                    })
            }
            _ => {
                let Some(value) = arg.filter(|_| accepted) else {
                    return Err(HostException::new(
                        "System.ArgumentException",
                        format!("The value is not of type {element_name} and cannot be used in this generic collection."),
                    )
                    .into());
                };
                items.push(value);
                Ok(HostValue::Null)
            }
        }
    }

    fn deep_copy(&mut self, obj: ObjectRef) -> ObjectRef {
        let Some(original) = self.object(obj).cloned() else {
            return obj;
        };
        let copy = match original {
            MockObject::Instance { class, fields } => MockObject::Instance {
                class,
                fields: fields
                    .into_iter()
                    .map(|(f, v)| (f, self.deep_copy_value(v)))
                    .collect(),
            },
            MockObject::Array { class, items } => MockObject::Array {
                class,
                items: items.into_iter().map(|v| self.deep_copy_value(v)).collect(),
            },
            MockObject::List { class, items } => MockObject::List {
                class,
                items: items.map(|items| items.into_iter().map(|v| self.deep_copy_value(v)).collect()),
            },
            other => other,
        };
        self.objects.insert(copy).into_ref()
    }

    fn deep_copy_value(&mut self, value: HostValue) -> HostValue {
        match value {
            HostValue::Object(obj) => HostValue::Object(self.deep_copy(obj)),
            other => other,
        }
    }
}

trait IntoRef {
    fn into_ref(self) -> ObjectRef;
}

impl IntoRef for DefaultKey {
    fn into_ref(self) -> ObjectRef {
        ObjectRef::from_raw(self.data().as_ffi())
    }
}

fn object_key(obj: ObjectRef) -> DefaultKey {
    KeyData::from_ffi(obj.raw()).into()
}

fn class_ref(index: usize) -> ClassRef {
    ClassRef::from_raw(index as u64 + 1)
}

fn class_info(namespace: &str, name: &str) -> ClassInfo {
    ClassInfo {
        name: name.to_string(),
        namespace: namespace.to_string(),
        is_enum: false,
        parent: None,
        nesting: None,
    }
}

fn split_name(full: &str) -> (&str, &str) {
    full.rsplit_once('.').unwrap_or(("", full))
}

fn width_primitive(width: IntWidth) -> PrimitiveType {
    match width {
        IntWidth::I8 => PrimitiveType::I8,
        IntWidth::U8 => PrimitiveType::U8,
        IntWidth::I16 => PrimitiveType::I16,
        IntWidth::U16 => PrimitiveType::U16,
        IntWidth::I32 => PrimitiveType::I32,
        IntWidth::U32 => PrimitiveType::U32,
        IntWidth::I64 => PrimitiveType::I64,
        IntWidth::U64 => PrimitiveType::U64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        let mock = MockHost::new();
        let colour = mock.define_class("libMBIN.NMS", "Colour");
        let inner = mock.define_nested_class(colour, "Channel");
        let float = mock.primitive(PrimitiveType::F32);

        let list = mock.list_of(colour);
        let f1 = mock.add_field(inner, "Values", mock.array_of(float));
        let f2 = mock.add_field(inner, "Colours", list);
        let f3 = mock.add_field(inner, "Map", mock.hashmap_of(colour));

        assert_eq!(mock.field_info(f1).unwrap().type_name, "System.Single[]");
        assert_eq!(
            mock.field_info(f2).unwrap().type_name,
            "System.Collections.Generic.List`1<libMBIN.NMS.Colour>"
        );
        assert_eq!(
            mock.field_info(f3).unwrap().type_name,
            "libMBIN.NMS.HashMap`1<libMBIN.NMS.Colour>"
        );
        assert_eq!(mock.list_of(colour), list);
        assert_eq!(mock.class_info(inner).unwrap().nesting, Some(colour));
    }

    #[test]
    fn test_find_nested_class() {
        let mock = MockHost::new();
        let outer = mock.define_class("libMBIN.NMS", "GcWeather");
        let inner = mock.define_nested_class(outer, "Storm");

        assert_eq!(mock.find_class("libMBIN.NMS", "GcWeather/Storm").unwrap(), inner);
        assert_eq!(mock.find_class("libMBIN.NMS", "GcWeather+Storm").unwrap(), inner);
        assert!(mock.find_class("libMBIN.NMS", "Storm").is_err());
    }

    #[test]
    fn test_enum_fields() {
        let mock = MockHost::new();
        let e = mock.define_enum("libMBIN.NMS", "Biome", IntWidth::U8, &[("Lush", 0), ("Toxic", 1)]);

        let fields = mock.class_fields(e).unwrap();
        assert_eq!(fields.len(), 3);
        assert_eq!(mock.field_info(fields[0]).unwrap().name, "value__");
        assert_eq!(mock.field_info(fields[0]).unwrap().type_name, "System.Byte");
        assert_eq!(mock.field_constant(fields[0]).unwrap(), None);
        assert_eq!(mock.field_constant(fields[2]).unwrap(), Some(HostValue::U8(1)));
    }

    #[test]
    fn test_set_field_type_checks() {
        let mock = MockHost::new();
        let class = mock.define_class("libMBIN.NMS", "Thing");
        let int = mock.add_field(class, "Count", mock.primitive(PrimitiveType::I32));
        let name = mock.add_field(class, "Name", mock.primitive(PrimitiveType::String));
        let obj = mock.instantiate(class);

        assert!(mock.set_field(obj, int, HostValue::I32(4)).is_ok());
        assert!(mock.set_field(obj, int, HostValue::I64(4)).is_err());
        let text = mock.new_string("hello").unwrap();
        assert!(mock.set_field(obj, name, HostValue::Object(text)).is_ok());
        assert!(mock.set_field(obj, name, HostValue::Bool(true)).is_err());
        assert_eq!(mock.get_field(obj, int).unwrap(), HostValue::I32(4));
    }

    #[test]
    fn test_list_protocol() {
        let mock = MockHost::new();
        let int = mock.primitive(PrimitiveType::I32);
        let list_class = mock.list_of(int);
        let list = mock.new_object(list_class).unwrap();

        // not constructed yet
        assert!(mock.invoke(list_class, names::GET_COUNT, Some(list), &[]).is_err());

        mock.init_object(list).unwrap();
        let boxed = mock.box_value(int, HostValue::I32(7)).unwrap();
        mock.invoke(list_class, names::ADD, Some(list), &[HostValue::Object(boxed)])
            .unwrap();
        mock.invoke(list_class, names::ADD, Some(list), &[HostValue::I32(8)])
            .unwrap();

        assert_eq!(
            mock.invoke(list_class, names::GET_COUNT, Some(list), &[]).unwrap(),
            HostValue::I32(2)
        );
        assert_eq!(
            mock.invoke(list_class, names::GET_ITEM, Some(list), &[HostValue::I32(1)])
                .unwrap(),
            HostValue::I32(8)
        );
        assert!(mock
            .invoke(list_class, names::GET_ITEM, Some(list), &[HostValue::I32(2)])
            .is_err());
    }

    #[test]
    fn test_write_and_load_are_deep_copies() {
        let mock = MockHost::new();
        let class = mock.define_class("libMBIN.NMS", "Thing");
        mock.add_field(class, "Count", mock.primitive(PrimitiveType::I32));
        let obj = mock.instantiate(class);
        mock.set(obj, "Count", HostValue::I32(1));

        let path = mock.string("out/thing.MBIN");
        mock.invoke(mock.template(), names::WRITE_MBIN, Some(obj), &[HostValue::Object(path)])
            .unwrap();
        mock.set(obj, "Count", HostValue::I32(2));

        let stored = mock.stored_file("out/thing.MBIN").unwrap();
        assert_eq!(mock.get(stored, "Count"), HostValue::I32(1));
        assert_eq!(mock.writes(), vec![("WriteToMbin".to_string(), PathBuf::from("out/thing.MBIN"))]);
    }

    #[test]
    fn test_failure_on_specific_call() {
        let mock = MockHost::new();
        let list_class = mock.list_of(mock.primitive(PrimitiveType::I32));
        let list = mock.instantiate(list_class);
        mock.fail_method_on_call(list_class, names::ADD, 1, HostException::new("System.Exception", "boom"));

        assert!(mock.invoke(list_class, names::ADD, Some(list), &[HostValue::I32(1)]).is_ok());
        assert!(mock.invoke(list_class, names::ADD, Some(list), &[HostValue::I32(2)]).is_err());
        assert!(mock.invoke(list_class, names::ADD, Some(list), &[HostValue::I32(3)]).is_ok());
        assert_eq!(mock.items(list).unwrap(), vec![HostValue::I32(1), HostValue::I32(3)]);
    }

    #[test]
    fn test_type_table_rows() {
        let mock = MockHost::new();
        mock.add_unresolvable_type("Broken");
        let assembly = mock.load_assembly(Path::new("libMBIN.dll")).unwrap();

        let count = mock.type_count(assembly).unwrap();
        assert!(matches!(
            mock.type_at(assembly, count - 1),
            Err(HostError::UnresolvableType(name)) if name == "Broken"
        ));
        assert!(mock.type_at(assembly, count).is_err());
    }
}
