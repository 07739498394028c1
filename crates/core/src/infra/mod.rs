pub mod api;
pub mod cache;
pub mod image_codec;
pub mod logger;
pub mod normalizer;
pub mod notifier;
pub mod retry;
pub mod session_store;
pub mod validator;

#[cfg(test)]
pub(crate) mod test_http;
