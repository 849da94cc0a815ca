//! Generates Swift and Kotlin bindings for the `keychainkit` library.

fn main() {
    uniffi::uniffi_bindgen_main();
}
