//! Host session state
//!
//! The session is acquired once via [`HostSession::open`] and threaded through
//! every operation that needs the host. It owns the host backend together with
//! the classes resolved at startup (the root template class and the file-IO
//! entry point) and a cache of later class lookups.

use std::path::PathBuf;

use dashmap::DashMap;
use tracing::{debug, error, info, trace};

use mbinbridge_sdk::{names, AssemblyRef, ClassRef, HostException, HostValue, ObjectRef};

use crate::error::HostError;
use crate::hash::combined_hash;
use crate::runtime::RuntimeHost;

/// Where the session finds the asset library and its entry points
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionLayout {
    /// Path of the managed asset library
    pub assembly: PathBuf,
    /// Namespace holding the template and file-IO classes
    pub root_namespace: String,
    /// Root class every asset record derives from
    pub template_class: String,
    /// Class exposing `LoadFile`
    pub file_io_class: String,
}

impl SessionLayout {
    /// Layout for an assembly using the library's standard class names
    pub fn new(assembly: impl Into<PathBuf>) -> Self {
        Self {
            assembly: assembly.into(),
            root_namespace: names::ROOT_NAMESPACE.to_string(),
            template_class: names::TEMPLATE_CLASS.to_string(),
            file_io_class: names::FILE_IO_CLASS.to_string(),
        }
    }
}

/// An open connection to the hosted object model
pub struct HostSession {
    host: Box<dyn RuntimeHost>,
    assembly: AssemblyRef,
    template_class: ClassRef,
    file_io_class: ClassRef,
    file_io: ObjectRef,
    /// (namespace_hash << 32 | name_hash) -> classes sharing that key
    class_cache: DashMap<u64, Vec<CachedClass>>,
}

/// Cache entry; the names are kept so colliding keys resolve correctly
#[derive(Debug)]
struct CachedClass {
    namespace: Box<str>,
    name: Box<str>,
    class: ClassRef,
}

impl CachedClass {
    fn matches(&self, namespace: &str, name: &str) -> bool {
        &*self.namespace == namespace && &*self.name == name
    }
}

impl HostSession {
    /// Load the asset library and resolve its entry points
    ///
    /// Fails if the assembly cannot be loaded, either class is missing, or the
    /// file-IO instance cannot be constructed.
    #[tracing::instrument(skip_all)]
    pub fn open(host: Box<dyn RuntimeHost>, layout: &SessionLayout) -> Result<Self, HostError> {
        let assembly = host.load_assembly(&layout.assembly)?;
        info!("Loaded assembly {}: {}", layout.assembly.display(), assembly);

        let template_class = host.find_class(&layout.root_namespace, &layout.template_class)?;
        info!(
            "{}.{}: {}",
            layout.root_namespace, layout.template_class, template_class
        );

        let file_io_class = host.find_class(&layout.root_namespace, &layout.file_io_class)?;
        info!(
            "{}.{}: {}",
            layout.root_namespace, layout.file_io_class, file_io_class
        );

        let session = Self {
            host,
            assembly,
            template_class,
            file_io_class,
            file_io: ObjectRef::from_raw(0),
            class_cache: DashMap::new(),
        };

        let file_io = session.create_instance(file_io_class)?;
        debug!("File IO instance: {}", file_io);

        Ok(Self { file_io, ..session })
    }

    /// The host backend
    pub fn host(&self) -> &dyn RuntimeHost {
        self.host.as_ref()
    }

    /// The loaded asset library
    pub fn assembly(&self) -> AssemblyRef {
        self.assembly
    }

    /// Root template class (owner of the `WriteTo*` methods)
    pub fn template_class(&self) -> ClassRef {
        self.template_class
    }

    /// File-IO class (owner of `LoadFile`)
    pub fn file_io_class(&self) -> ClassRef {
        self.file_io_class
    }

    /// File-IO instance used as the `LoadFile` receiver
    pub fn file_io(&self) -> ObjectRef {
        self.file_io
    }

    /// Find a class by namespace and name
    ///
    /// Cached - repeated lookups of the same class do not reach the host.
    pub fn class(&self, namespace: &str, name: &str) -> Result<ClassRef, HostError> {
        let cache_key = combined_hash(namespace.as_bytes(), name.as_bytes());
        if let Some(bucket) = self.class_cache.get(&cache_key) {
            if let Some(entry) = bucket.iter().find(|e| e.matches(namespace, name)) {
                trace!("Cache hit for {}.{}: {}", namespace, name, entry.class);
                return Ok(entry.class);
            }
            debug!("Hash collision for {}.{}", namespace, name);
        }

        let class = self.host.find_class(namespace, name)?;
        debug!("Resolved {}.{}: {}", namespace, name, class);

        self.class_cache.entry(cache_key).or_default().push(CachedClass {
            namespace: namespace.into(),
            name: name.into(),
            class,
        });
        Ok(class)
    }

    /// Allocate an object and run its parameterless constructor
    pub fn create_instance(&self, class: ClassRef) -> Result<ObjectRef, HostError> {
        let obj = self.host.new_object(class)?;
        if let Err(e) = self.host.init_object(obj) {
            self.report(&e, "constructor");
            return Err(e);
        }
        Ok(obj)
    }

    /// Invoke a host method, logging any host exception it raises
    pub fn invoke(
        &self,
        class: ClassRef,
        method: &str,
        target: Option<ObjectRef>,
        args: &[HostValue],
    ) -> Result<HostValue, HostError> {
        self.host
            .invoke(class, method, target, args)
            .inspect_err(|e| self.report(e, method))
    }

    /// Log a host error; exceptions get their full chain
    pub fn report(&self, err: &HostError, context: &str) {
        match err {
            HostError::Exception(exception) => self.report_exception(exception, context),
            other => error!("Host call {} failed: {}", context, other),
        }
    }

    /// Log an exception's message, stack trace and every inner exception
    pub fn report_exception(&self, exception: &HostException, context: &str) {
        error!(
            "Exception occurred in {}: {}",
            context, exception
        );
        if let Some(trace) = &exception.stack_trace {
            error!("Exception stack trace: {}", trace);
        }

        for (depth, inner) in exception.chain().skip(1).enumerate() {
            error!("Inner exception [{}]: {}", depth + 1, inner);
            if let Some(trace) = &inner.stack_trace {
                error!("Inner exception stack trace [{}]: {}", depth + 1, trace);
            }
        }
    }
}

impl std::fmt::Debug for HostSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostSession")
            .field("assembly", &self.assembly)
            .field("template_class", &self.template_class)
            .field("file_io_class", &self.file_io_class)
            .field("file_io", &self.file_io)
            .field(
                "cached_classes",
                &self.class_cache.iter().map(|b| b.len()).sum::<usize>(),
            )
            .finish()
    }
}
