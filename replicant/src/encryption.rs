use std::sync::Once;

use tracing::debug;

static INIT_CRYPTO: Once = Once::new();

/// Installs the AWS LC provider as the process-wide rustls default.
///
/// Several providers are compiled in through the http client, so rustls can't pick one on its own.
/// A provider installed earlier by the embedding application is kept.
pub fn install_crypto_provider() {
    INIT_CRYPTO.call_once(|| {
        if rustls::crypto::aws_lc_rs::default_provider()
            .install_default()
            .is_err()
        {
            debug!("a rustls crypto provider was already installed");
        }
    });
}
