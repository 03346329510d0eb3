macros_utils::routes! {
    mod health,
    mod api => "/api",
}
