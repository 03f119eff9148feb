//! Named component types.
//!
//! Components can be any `Send + Sync + 'static` type. The [`Component`]
//! trait adds the stable name used to key persisted data and diagnostics.

/// Trait for named ECS components.
///
/// # Example
///
/// ```
/// use worlds_ecs::Component;
///
/// struct Health {
///     current: f32,
/// }
///
/// impl Component for Health {
///     const NAME: &'static str = "Health";
/// }
///
/// assert_eq!(Health { current: 1.0 }.component_name(), "Health");
/// ```
pub trait Component: Send + Sync + 'static {
    /// The stable name as a static string (e.g. `"Transform"`).
    ///
    /// Persisted documents key component data by this name, so renaming a
    /// component breaks existing files.
    const NAME: &'static str;

    /// Returns the component name.
    fn component_name(&self) -> &'static str {
        Self::NAME
    }
}
