//! JSON API consumed by the presentation layer.

macros_utils::routes! {
    mod targets,
    mod settings,
    mod smtp,
    mod alerts,
}
