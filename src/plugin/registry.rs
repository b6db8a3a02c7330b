//! Process-wide registry of roles and the driver types implementing them.
//!
//! Rust has no definition-time hooks, so registration is an explicit call
//! made once at startup.  The [`global`] registry is seeded with the
//! built-in managers on first use; hosts may append their own types.
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock, RwLock};

use super::context::ExecutionContext;
use super::driver::{Driver, DriverType, Role};
use super::token::Token;
use crate::error::DispatchError;

/// Whether a registered type is discoverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// Excluded from its collection (only this type, never its "subtypes").
    Abstract,
    /// Discoverable and instantiable.
    Concrete,
}

type Factory = fn(Arc<ExecutionContext>) -> Box<dyn Driver>;

#[derive(Debug, Clone)]
struct DriverEntry {
    token: Token,
    type_id: TypeId,
    factory: Factory,
}

#[derive(Debug, Clone)]
struct RoleEntry {
    token: Token,
    type_id: TypeId,
}

#[derive(Debug, Default)]
struct Inner {
    roles: Vec<RoleEntry>,
    drivers: HashMap<Token, Vec<DriverEntry>>,
    abstract_types: HashSet<TypeId>,
}

/// Append-only collections of roles and drivers.
///
/// # Examples
///
/// ```ignore
/// let registry = Registry::new();
/// registry.register_role::<PackageManager>(TypeKind::Concrete)?;
/// registry.register_driver::<Apt>(TypeKind::Concrete)?;
/// assert_eq!(registry.driver_tokens(&PackageManager::token()), ["apt"]);
/// ```
#[derive(Debug, Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

fn build_driver<D: DriverType>(ctx: Arc<ExecutionContext>) -> Box<dyn Driver> {
    Box::new(D::build(ctx))
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Register a manager role.
    ///
    /// A role declared abstract stays out even if registered as concrete
    /// later.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::DuplicateToken`] if a different role type
    /// already uses the same token.
    pub fn register_role<R: Role>(&self, kind: TypeKind) -> Result<(), DispatchError> {
        let token = R::token();
        let type_id = TypeId::of::<R>();
        let mut inner = self.write();
        if kind == TypeKind::Abstract {
            inner.abstract_types.insert(type_id);
            inner.roles.retain(|r| r.type_id != type_id);
            tracing::debug!(role = %token, "role declared abstract");
            return Ok(());
        }
        if inner.abstract_types.contains(&type_id) {
            tracing::debug!(role = %token, "skipping abstract role");
            return Ok(());
        }
        if let Some(existing) = inner.roles.iter().find(|r| r.token == token) {
            if existing.type_id == type_id {
                return Ok(());
            }
            return Err(DispatchError::DuplicateToken {
                collection: "roles".to_string(),
                token,
            });
        }
        tracing::debug!(role = %token, "registered role");
        inner.roles.push(RoleEntry { token, type_id });
        Ok(())
    }

    /// Register a driver type under the role it declares.
    ///
    /// `TypeKind::Abstract` removes exactly `D` from the collection (if an
    /// earlier call registered it) and keeps it out; other types are
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::DuplicateToken`] if a different driver type
    /// of the same role already uses the same token.
    pub fn register_driver<D: DriverType>(&self, kind: TypeKind) -> Result<(), DispatchError> {
        let role = <D::Role as Role>::token();
        let token = Token::of::<D>();
        let type_id = TypeId::of::<D>();
        let mut inner = self.write();
        if kind == TypeKind::Abstract {
            inner.abstract_types.insert(type_id);
            if let Some(entries) = inner.drivers.get_mut(&role) {
                entries.retain(|e| e.type_id != type_id);
            }
            tracing::debug!(%role, driver = %token, "driver declared abstract");
            return Ok(());
        }
        if inner.abstract_types.contains(&type_id) {
            tracing::debug!(%role, driver = %token, "skipping abstract driver");
            return Ok(());
        }
        let entries = inner.drivers.entry(role.clone()).or_default();
        if let Some(existing) = entries.iter().find(|e| e.token == token) {
            if existing.type_id == type_id {
                return Ok(());
            }
            return Err(DispatchError::DuplicateToken {
                collection: role.to_string(),
                token,
            });
        }
        tracing::debug!(%role, driver = %token, "registered driver");
        entries.push(DriverEntry {
            token,
            type_id,
            factory: build_driver::<D>,
        });
        Ok(())
    }

    /// Tokens of all concrete roles, in registration order.
    #[must_use]
    pub fn role_tokens(&self) -> Vec<Token> {
        self.read().roles.iter().map(|r| r.token.clone()).collect()
    }

    /// Tokens of all concrete drivers for `role`, in registration order.
    #[must_use]
    pub fn driver_tokens(&self, role: &str) -> Vec<Token> {
        self.read()
            .drivers
            .get(role)
            .map(|entries| entries.iter().map(|e| e.token.clone()).collect())
            .unwrap_or_default()
    }

    /// Returns `true` if `D` is registered as a concrete driver.
    #[must_use]
    pub fn contains_driver<D: DriverType>(&self) -> bool {
        let role = <D::Role as Role>::token();
        let type_id = TypeId::of::<D>();
        self.read()
            .drivers
            .get(&role)
            .is_some_and(|entries| entries.iter().any(|e| e.type_id == type_id))
    }

    /// Returns `true` if type `T` was declared abstract.
    #[must_use]
    pub fn is_abstract<T: 'static>(&self) -> bool {
        self.read().abstract_types.contains(&TypeId::of::<T>())
    }

    /// Instantiate every concrete driver of `role`, bound to `ctx`, in
    /// registration order.
    #[must_use]
    pub fn instantiate(&self, role: &str, ctx: &Arc<ExecutionContext>) -> Vec<Box<dyn Driver>> {
        let factories: Vec<Factory> = self
            .read()
            .drivers
            .get(role)
            .map(|entries| entries.iter().map(|e| e.factory).collect())
            .unwrap_or_default();
        factories
            .into_iter()
            .map(|factory| factory(Arc::clone(ctx)))
            .collect()
    }
}

/// A registry together with the error, if any, raised while seeding it.
struct Seeded {
    registry: Registry,
    error: Option<DispatchError>,
}

impl Seeded {
    fn new(seed: fn(&Registry) -> Result<(), DispatchError>) -> Self {
        let registry = Registry::new();
        let error = seed(&registry).err();
        if let Some(e) = &error {
            tracing::error!("failed to register built-in drivers: {e}");
        }
        Self { registry, error }
    }

    fn get(&self) -> Result<&Registry, &DispatchError> {
        self.error.as_ref().map_or(Ok(&self.registry), Err)
    }
}

static GLOBAL: LazyLock<Seeded> =
    LazyLock::new(|| Seeded::new(crate::managers::register_builtins));

/// The process-wide registry, seeded with the built-in managers.
///
/// If seeding failed the registry may be incomplete; use [`seeded`] to
/// find out.
#[must_use]
pub fn global() -> &'static Registry {
    &GLOBAL.registry
}

/// The process-wide registry, only if every built-in registered cleanly.
///
/// # Errors
///
/// Returns the error raised while registering the built-in managers.
pub fn seeded() -> Result<&'static Registry, &'static DispatchError> {
    GLOBAL.get()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::plugin::driver::{Args, Outcome};

    struct Widgets;
    impl Role for Widgets {}

    struct Gadgets;
    impl Role for Gadgets {}

    macro_rules! test_driver {
        ($vis:vis $name:ident, $role:ty) => {
            #[derive(Debug)]
            $vis struct $name;

            impl Driver for $name {
                fn operations(&self) -> &'static [&'static str] {
                    &[]
                }

                fn call(&self, _: &str, _: &Args) -> anyhow::Result<Outcome> {
                    Ok(Outcome::Unchanged)
                }
            }

            impl DriverType for $name {
                type Role = $role;

                fn build(_: Arc<ExecutionContext>) -> Self {
                    Self
                }
            }
        };
    }

    test_driver!(BaseWidget, Widgets);
    test_driver!(FancyWidget, Widgets);
    test_driver!(PlainWidget, Widgets);
    test_driver!(SmallGadget, Gadgets);

    mod other {
        use super::*;
        test_driver!(pub(super) PlainWidget, Widgets);
    }

    #[test]
    fn drivers_are_grouped_by_declared_role() {
        let r = Registry::new();
        r.register_driver::<FancyWidget>(TypeKind::Concrete).unwrap();
        r.register_driver::<SmallGadget>(TypeKind::Concrete).unwrap();
        assert_eq!(r.driver_tokens("widgets"), [Token::new("fancy_widget")]);
        assert_eq!(r.driver_tokens("gadgets"), [Token::new("small_gadget")]);
        assert!(r.driver_tokens("nothing").is_empty());
    }

    #[test]
    fn abstract_excludes_only_the_declaring_type() {
        let r = Registry::new();
        r.register_driver::<BaseWidget>(TypeKind::Abstract).unwrap();
        r.register_driver::<FancyWidget>(TypeKind::Concrete).unwrap();
        assert!(!r.contains_driver::<BaseWidget>());
        assert!(r.is_abstract::<BaseWidget>());
        assert!(r.contains_driver::<FancyWidget>());
        assert!(!r.is_abstract::<FancyWidget>());
    }

    #[test]
    fn abstract_after_concrete_removes_once() {
        let r = Registry::new();
        r.register_driver::<BaseWidget>(TypeKind::Concrete).unwrap();
        r.register_driver::<PlainWidget>(TypeKind::Concrete).unwrap();
        r.register_driver::<BaseWidget>(TypeKind::Abstract).unwrap();
        assert_eq!(r.driver_tokens("widgets"), [Token::new("plain_widget")]);
    }

    #[test]
    fn registration_order_is_kept() {
        let r = Registry::new();
        r.register_driver::<PlainWidget>(TypeKind::Concrete).unwrap();
        r.register_driver::<FancyWidget>(TypeKind::Concrete).unwrap();
        assert_eq!(
            r.driver_tokens("widgets"),
            [Token::new("plain_widget"), Token::new("fancy_widget")]
        );
    }

    #[test]
    fn reregistering_same_type_is_noop() {
        let r = Registry::new();
        r.register_driver::<PlainWidget>(TypeKind::Concrete).unwrap();
        r.register_driver::<PlainWidget>(TypeKind::Concrete).unwrap();
        assert_eq!(r.driver_tokens("widgets").len(), 1);
    }

    #[test]
    fn same_token_from_different_type_is_rejected() {
        let r = Registry::new();
        r.register_driver::<PlainWidget>(TypeKind::Concrete).unwrap();
        let err = r
            .register_driver::<other::PlainWidget>(TypeKind::Concrete)
            .unwrap_err();
        assert!(matches!(err, DispatchError::DuplicateToken { .. }));
    }

    #[test]
    fn concrete_after_abstract_stays_excluded() {
        let r = Registry::new();
        r.register_driver::<BaseWidget>(TypeKind::Abstract).unwrap();
        r.register_driver::<BaseWidget>(TypeKind::Concrete).unwrap();
        r.register_driver::<PlainWidget>(TypeKind::Concrete).unwrap();
        assert!(r.is_abstract::<BaseWidget>());
        assert!(!r.contains_driver::<BaseWidget>());
        assert_eq!(r.driver_tokens("widgets"), [Token::new("plain_widget")]);
    }

    #[test]
    fn role_declared_abstract_is_not_readded() {
        let r = Registry::new();
        r.register_role::<Gadgets>(TypeKind::Abstract).unwrap();
        r.register_role::<Gadgets>(TypeKind::Concrete).unwrap();
        assert!(r.role_tokens().is_empty());
    }

    #[test]
    fn roles_register_and_exclude() {
        let r = Registry::new();
        r.register_role::<Widgets>(TypeKind::Concrete).unwrap();
        r.register_role::<Gadgets>(TypeKind::Abstract).unwrap();
        assert_eq!(r.role_tokens(), [Token::new("widgets")]);
        assert!(r.is_abstract::<Gadgets>());
    }

    #[test]
    fn instantiate_builds_in_order() {
        let r = Registry::new();
        r.register_driver::<PlainWidget>(TypeKind::Concrete).unwrap();
        r.register_driver::<FancyWidget>(TypeKind::Concrete).unwrap();
        let ctx = Arc::new(crate::plugin::test_helpers::test_context());
        let tokens: Vec<Token> = r
            .instantiate("widgets", &ctx)
            .iter()
            .map(|d| d.token())
            .collect();
        assert_eq!(tokens, [Token::new("plain_widget"), Token::new("fancy_widget")]);
    }

    #[test]
    fn seeding_error_is_kept() {
        fn clashing(r: &Registry) -> Result<(), DispatchError> {
            r.register_driver::<PlainWidget>(TypeKind::Concrete)?;
            r.register_driver::<other::PlainWidget>(TypeKind::Concrete)
        }
        let seeded = Seeded::new(clashing);
        assert!(matches!(
            seeded.get(),
            Err(DispatchError::DuplicateToken { .. })
        ));
        assert_eq!(seeded.registry.driver_tokens("widgets").len(), 1);
    }

    #[test]
    fn global_registry_seeds_cleanly() {
        assert!(seeded().is_ok());
    }

    #[test]
    fn global_registry_has_builtin_roles() {
        let roles = global().role_tokens();
        assert!(roles.contains(&Token::new("package_manager")));
        assert!(roles.contains(&Token::new("service_manager")));
        assert!(roles.contains(&Token::new("file_manager")));
    }
}
