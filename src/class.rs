//! Registration-time class metadata.
//!
//! A class is anything the container can build by name: its declared
//! constructor parameters, injection points, and the typed closures that
//! perform construction and injection. [`ClassRegistry`] is the crate's
//! [`TypeIntrospector`]: it answers "what does class X look like" from what
//! was declared through [`ClassBuilder`], instead of reflecting at runtime.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::arguments::{Argument, Arguments};
use crate::error::{DiError, DiResult};
use crate::prototype::TypeIntrospector;

/// Type-erased boxed instance, mutable until stored.
pub type AnyBox = Box<dyn Any + Send + Sync>;

pub(crate) type ConstructorFn = Arc<dyn Fn(&Arguments) -> DiResult<AnyBox> + Send + Sync>;
pub(crate) type SetterFn = Arc<dyn Fn(&mut (dyn Any + Send + Sync), Argument) -> DiResult<()> + Send + Sync>;
pub(crate) type InvokerFn =
    Arc<dyn Fn(&mut (dyn Any + Send + Sync), &Arguments) -> DiResult<()> + Send + Sync>;

/// A declared parameter or injected property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    /// Abstract identifier the parameter is typed as, if any.
    pub type_name: Option<String>,
    pub default: Option<Value>,
    pub nullable: bool,
    pub variadic: bool,
}

impl Param {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: None,
            default: None,
            nullable: false,
            variadic: false,
        }
    }

    /// Parameter typed as the service `type_name`.
    pub fn service(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::new(name).typed(type_name)
    }

    pub fn typed(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }
}

/// A declared injection method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDecl {
    pub name: String,
    pub params: Vec<Param>,
}

/// Everything an introspector reports about a class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetadata {
    pub name: String,
    /// `false` for interfaces and abstract types.
    pub instantiable: bool,
    /// Constructor parameters, `None` when no constructor is declared.
    pub constructor: Option<Vec<Param>>,
    pub properties: Vec<Param>,
    pub methods: Vec<MethodDecl>,
}

impl ClassMetadata {
    pub fn interface(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instantiable: false,
            constructor: None,
            properties: Vec::new(),
            methods: Vec::new(),
        }
    }
}

/// A registered class: metadata plus the closures that act on it.
#[derive(Clone)]
pub struct ClassDescriptor {
    metadata: ClassMetadata,
    type_name: &'static str,
    constructor: Option<ConstructorFn>,
    setters: HashMap<String, SetterFn>,
    invokers: HashMap<String, InvokerFn>,
}

impl ClassDescriptor {
    /// Describes an interface or abstract type. It can be bound to a concrete
    /// class but never built itself.
    pub fn interface(name: impl Into<String>) -> Self {
        Self {
            metadata: ClassMetadata::interface(name),
            type_name: "<interface>",
            constructor: None,
            setters: HashMap::new(),
            invokers: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn metadata(&self) -> &ClassMetadata {
        &self.metadata
    }

    /// Rust type the constructor produces.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is_instantiable(&self) -> bool {
        self.metadata.instantiable
    }

    pub(crate) fn construct(&self, arguments: &Arguments) -> DiResult<AnyBox> {
        let ctor = self.constructor.as_ref().ok_or_else(|| DiError::Reflection {
            class: self.metadata.name.clone(),
            reason: "no constructor registered".to_string(),
        })?;
        ctor(arguments)
    }

    pub(crate) fn inject_property(
        &self,
        target: &mut (dyn Any + Send + Sync),
        property: &str,
        argument: Argument,
    ) -> DiResult<()> {
        let setter = self.setters.get(property).ok_or_else(|| DiError::Reflection {
            class: self.metadata.name.clone(),
            reason: format!("no setter for property [{}]", property),
        })?;
        setter(target, argument)
    }

    pub(crate) fn invoke_method(
        &self,
        target: &mut (dyn Any + Send + Sync),
        method: &str,
        arguments: &Arguments,
    ) -> DiResult<()> {
        let invoker = self.invokers.get(method).ok_or_else(|| DiError::Reflection {
            class: self.metadata.name.clone(),
            reason: format!("no injection method [{}]", method),
        })?;
        invoker(target, arguments)
    }
}

impl fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("metadata", &self.metadata)
            .field("type_name", &self.type_name)
            .field("has_constructor", &self.constructor.is_some())
            .finish()
    }
}

/// Typed builder for a [`ClassDescriptor`].
///
/// # Examples
///
/// ```rust
/// use resolvit::{ClassBuilder, ContainerBuilder, Param, Resolver};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct Repository { db: Arc<Database>, table: String }
///
/// let mut builder = ContainerBuilder::new();
/// builder.class(
///     ClassBuilder::<Database>::new("Database")
///         .param(Param::new("url").default("postgres://localhost"))
///         .constructor(|args| Ok(Database { url: args.value("url")? })),
/// );
/// builder.class(
///     ClassBuilder::<Repository>::new("Repository")
///         .param(Param::service("db", "Database"))
///         .param(Param::new("table").default("users"))
///         .constructor(|args| Ok(Repository {
///             db: args.service("db")?,
///             table: args.value("table")?,
///         })),
/// );
///
/// let container = builder.build();
/// let repo = container.get_as::<Repository>("Repository").unwrap();
/// assert_eq!(repo.db.url, "postgres://localhost");
/// assert_eq!(repo.table, "users");
/// ```
pub struct ClassBuilder<T> {
    name: String,
    params: Vec<Param>,
    properties: Vec<Param>,
    methods: Vec<MethodDecl>,
    constructor: Option<ConstructorFn>,
    setters: HashMap<String, SetterFn>,
    invokers: HashMap<String, InvokerFn>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> ClassBuilder<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            properties: Vec::new(),
            methods: Vec::new(),
            constructor: None,
            setters: HashMap::new(),
            invokers: HashMap::new(),
            _marker: PhantomData,
        }
    }

    /// Declares the next constructor parameter.
    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn constructor<F>(mut self, f: F) -> Self
    where
        F: Fn(&Arguments) -> DiResult<T> + Send + Sync + 'static,
    {
        self.constructor = Some(Arc::new(move |args: &Arguments| -> DiResult<AnyBox> {
            Ok(Box::new(f(args)?))
        }));
        self
    }

    /// Declares a property set after construction.
    pub fn property<F>(mut self, property: Param, setter: F) -> Self
    where
        F: Fn(&mut T, Argument) -> DiResult<()> + Send + Sync + 'static,
    {
        let name = property.name.clone();
        self.properties.push(property);
        self.setters.insert(
            name.clone(),
            Arc::new(move |target: &mut (dyn Any + Send + Sync), argument: Argument| {
                let target = target.downcast_mut::<T>().ok_or_else(|| DiError::TypeMismatch {
                    id: name.clone(),
                    expected: std::any::type_name::<T>(),
                })?;
                setter(target, argument)
            }),
        );
        self
    }

    /// Declares a method called after property injection.
    pub fn method<F>(mut self, name: impl Into<String>, params: Vec<Param>, invoke: F) -> Self
    where
        F: Fn(&mut T, &Arguments) -> DiResult<()> + Send + Sync + 'static,
    {
        let name = name.into();
        self.methods.push(MethodDecl {
            name: name.clone(),
            params,
        });
        self.invokers.insert(
            name.clone(),
            Arc::new(move |target: &mut (dyn Any + Send + Sync), args: &Arguments| {
                let target = target.downcast_mut::<T>().ok_or_else(|| DiError::TypeMismatch {
                    id: name.clone(),
                    expected: std::any::type_name::<T>(),
                })?;
                invoke(target, args)
            }),
        );
        self
    }

    pub fn build(self) -> ClassDescriptor {
        let constructor_params = self.constructor.as_ref().map(|_| self.params);
        ClassDescriptor {
            metadata: ClassMetadata {
                name: self.name,
                instantiable: true,
                constructor: constructor_params,
                properties: self.properties,
                methods: self.methods,
            },
            type_name: std::any::type_name::<T>(),
            constructor: self.constructor,
            setters: self.setters,
            invokers: self.invokers,
        }
    }
}

impl<T: Any + Send + Sync + Default> ClassBuilder<T> {
    /// Class built with `T::default()` and no constructor parameters.
    pub fn with_default(name: impl Into<String>) -> Self {
        Self::new(name).constructor(|_| Ok(T::default()))
    }
}

impl<T: Any + Send + Sync> From<ClassBuilder<T>> for ClassDescriptor {
    fn from(builder: ClassBuilder<T>) -> Self {
        builder.build()
    }
}

/// All classes known to a container.
#[derive(Debug, Default, Clone)]
pub struct ClassRegistry {
    classes: HashMap<String, ClassDescriptor>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a class, replacing any previous one with the same name.
    pub fn register(&mut self, class: impl Into<ClassDescriptor>) {
        let class = class.into();
        self.classes.insert(class.name().to_string(), class);
    }

    pub fn get(&self, name: &str) -> Option<&ClassDescriptor> {
        self.classes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn is_instantiable(&self, name: &str) -> bool {
        self.classes.get(name).map_or(false, ClassDescriptor::is_instantiable)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl TypeIntrospector for ClassRegistry {
    fn describe(&self, class: &str) -> Option<ClassMetadata> {
        self.classes.get(class).map(|descriptor| descriptor.metadata.clone())
    }
}
