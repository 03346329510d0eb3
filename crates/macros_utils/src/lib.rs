//! Small declarative helpers shared by the binaries.

#[cfg(feature = "actix")]
#[doc(hidden)]
pub use actix_web as __actix;

/// Generate a `pub fn routes(cfg: &mut ServiceConfig)` for a routes module.
///
/// Leaf modules list their handlers:
///
/// ```ignore
/// macros_utils::routes! {
///     route list_targets,
///     route add_target,
/// }
/// ```
///
/// Parent modules declare child modules, optionally mounted under a scope:
///
/// ```ignore
/// macros_utils::routes! {
///     mod health,
///     mod api => "/api",
/// }
/// ```
#[cfg(feature = "actix")]
#[macro_export]
macro_rules! routes {
    (@mount $cfg:ident, $module:ident) => {
        $cfg.configure($module::routes);
    };
    (@mount $cfg:ident, $module:ident, $scope:literal) => {
        $cfg.service($crate::__actix::web::scope($scope).configure($module::routes));
    };
    ($(route $handler:path),+ $(,)?) => {
        pub fn routes(cfg: &mut $crate::__actix::web::ServiceConfig) {
            $( cfg.service($handler); )+
        }
    };
    ($(mod $module:ident $(=> $scope:literal)?),+ $(,)?) => {
        $( mod $module; )+

        pub fn routes(cfg: &mut $crate::__actix::web::ServiceConfig) {
            $( $crate::routes!(@mount cfg, $module $(, $scope)?); )+
        }
    };
}
