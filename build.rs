#[cfg(not(any(feature = "rustls-marker", feature = "native-marker")))]
compile_error!(
    "Either the `rustls` or `native` feature must be selected so the dialog \
    websocket client has a TLS backend.\n\
    - `rustls` uses Rustls, a pure Rust TLS implementation.\n\
    - `native` uses the platform's native TLS stack.\n\
    If you are unsure, go with `rustls`."
);

fn main() {}
