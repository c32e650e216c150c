use crate::targets::Target;
use crate::types::TlsFinding;
use anyhow::{anyhow, Context, Result};
use rustls::pki_types::ServerName;
use rustls::ClientConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time;
use tokio_rustls::TlsConnector;
use tokio_util::sync::CancellationToken;
use x509_parser::prelude::*;

/// Build a TLS connector for discovery probes.
///
/// Server identity and hostname verification are disabled on purpose: the
/// point is to record what a server offers, and a validating handshake would
/// reject exactly the legacy and misconfigured endpoints worth inventorying.
pub fn discovery_connector() -> TlsConnector {
    let config = ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCert))
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}

/// Probe one endpoint with a single TCP connect and TLS handshake.
///
/// Never fails past this boundary: any connect, resolution, or handshake
/// problem comes back as a finding with only `host`/`port`/`error` set.
pub async fn probe_endpoint(
    connector: &TlsConnector,
    host: &str,
    port: u16,
    connect_timeout: Duration,
    handshake_timeout: Duration,
) -> TlsFinding {
    match probe_inner(connector, host, port, connect_timeout, handshake_timeout).await {
        Ok(finding) => finding,
        Err(e) => TlsFinding::failure(host, port, format!("{e:#}")),
    }
}

async fn probe_inner(
    connector: &TlsConnector,
    host: &str,
    port: u16,
    connect_timeout: Duration,
    handshake_timeout: Duration,
) -> Result<TlsFinding> {
    let server_name =
        ServerName::try_from(host.to_string()).map_err(|_| anyhow!("invalid server name: {host}"))?;

    let stream = time::timeout(connect_timeout, TcpStream::connect((host, port)))
        .await
        .map_err(|_| anyhow!("connection timed out after {}ms", connect_timeout.as_millis()))?
        .context("connection failed")?;

    let tls_stream = time::timeout(handshake_timeout, connector.connect(server_name, stream))
        .await
        .map_err(|_| anyhow!("TLS handshake timed out after {}ms", handshake_timeout.as_millis()))?
        .context("TLS handshake failed")?;

    let (_io, connection) = tls_stream.get_ref();

    let protocol = connection.protocol_version().map(protocol_name);
    let cipher_suite = connection
        .negotiated_cipher_suite()
        .map(|cs| cipher_suite_name(cs.suite()));

    let mut finding = TlsFinding {
        host: host.to_string(),
        port,
        protocol,
        cipher_suite,
        cert_subject: None,
        cert_issuer: None,
        cert_not_before: None,
        cert_not_after: None,
        error: None,
    };

    // Leaf certificate only; chain validation is out of scope. An absent or
    // unparseable certificate leaves the cert fields unset without failing
    // the probe.
    if let Some(der) = connection.peer_certificates().and_then(|certs| certs.first()) {
        if let Ok((_, cert)) = X509Certificate::from_der(der.as_ref()) {
            finding.cert_subject = common_name(cert.subject());
            finding.cert_issuer = common_name(cert.issuer());
            finding.cert_not_before = Some(cert.validity().not_before.to_string());
            finding.cert_not_after = Some(cert.validity().not_after.to_string());
        }
    }

    Ok(finding)
}

fn common_name(name: &X509Name<'_>) -> Option<String> {
    name.iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(str::to_string)
}

/// Conventional protocol version string, e.g. "TLSv1.3".
fn protocol_name(version: rustls::ProtocolVersion) -> String {
    use rustls::ProtocolVersion::*;
    match version {
        TLSv1_3 => "TLSv1.3".to_string(),
        TLSv1_2 => "TLSv1.2".to_string(),
        TLSv1_1 => "TLSv1.1".to_string(),
        TLSv1_0 => "TLSv1".to_string(),
        SSLv3 => "SSLv3".to_string(),
        other => format!("{other:?}"),
    }
}

/// IANA cipher suite name. rustls debug-prints TLS 1.3 suites with a
/// `TLS13_` prefix, so those are remapped to their registered names.
fn cipher_suite_name(suite: rustls::CipherSuite) -> String {
    match suite {
        rustls::CipherSuite::TLS13_AES_128_GCM_SHA256 => "TLS_AES_128_GCM_SHA256".to_string(),
        rustls::CipherSuite::TLS13_AES_256_GCM_SHA384 => "TLS_AES_256_GCM_SHA384".to_string(),
        rustls::CipherSuite::TLS13_CHACHA20_POLY1305_SHA256 => {
            "TLS_CHACHA20_POLY1305_SHA256".to_string()
        }
        other => format!("{other:?}"),
    }
}

/// Probe the provided targets with a bounded number of concurrent handshakes.
///
/// - Limits in-flight probes with a `Semaphore`.
/// - Each probe is bounded by its own connect and handshake timeouts; a hung
///   peer cannot stall the run or other probes.
/// - Results are tagged with their input index and sorted after the pool
///   drains, so output order always matches target-list order.
pub async fn probe_targets(
    targets: &[Target],
    concurrency: usize,
    connect_timeout: Duration,
    handshake_timeout: Duration,
) -> Result<Vec<TlsFinding>> {
    probe_targets_with_cancel(
        targets,
        concurrency,
        connect_timeout,
        handshake_timeout,
        CancellationToken::new(),
    )
    .await
}

/// Variant that accepts a `CancellationToken`. Cancellation stops new probes
/// from being issued; probes already in flight run to completion.
pub async fn probe_targets_with_cancel(
    targets: &[Target],
    concurrency: usize,
    connect_timeout: Duration,
    handshake_timeout: Duration,
    cancel: CancellationToken,
) -> Result<Vec<TlsFinding>> {
    let connector = discovery_connector();
    let sem = Arc::new(Semaphore::new(concurrency.clamp(1, 1024)));
    let entries: Arc<Mutex<Vec<(usize, TlsFinding)>>> = Arc::new(Mutex::new(Vec::new()));
    let mut set = JoinSet::new();

    // Ctrl-C cancels the remainder of the run.
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        cancel_ctrlc.cancel();
    });

    for (idx, target) in targets.iter().cloned().enumerate() {
        if cancel.is_cancelled() {
            break;
        }
        let permit = sem
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore in scope");
        let connector = connector.clone();
        let entries = entries.clone();
        let cancel = cancel.clone();

        set.spawn(async move {
            let _permit = permit; // keep permit until task completes

            if cancel.is_cancelled() {
                return;
            }

            tracing::info!("probing {}:{}", target.host, target.port);
            let finding = probe_endpoint(
                &connector,
                &target.host,
                target.port,
                connect_timeout,
                handshake_timeout,
            )
            .await;

            let mut guard = entries.lock().await;
            guard.push((idx, finding));
        });
    }

    while let Some(_res) = set.join_next().await {}

    let mut tagged = std::mem::take(&mut *entries.lock().await);
    tagged.sort_by_key(|(idx, _)| *idx);
    Ok(tagged.into_iter().map(|(_, f)| f).collect())
}

/// Certificate verifier that accepts everything it is shown.
#[derive(Debug)]
struct AcceptAnyCert;

impl rustls::client::danger::ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
            rustls::SignatureScheme::RSA_PKCS1_SHA512,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA512,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::ECDSA_NISTP521_SHA512,
            rustls::SignatureScheme::ED25519,
            // Legacy schemes so old servers show up as inventory entries
            // instead of handshake failures.
            rustls::SignatureScheme::RSA_PKCS1_SHA1,
            rustls::SignatureScheme::ECDSA_SHA1_Legacy,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn unused_local_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        port
    }

    #[tokio::test]
    async fn refused_connection_yields_error_finding() {
        let port = unused_local_port().await;
        let connector = discovery_connector();
        let finding = probe_endpoint(
            &connector,
            "127.0.0.1",
            port,
            Duration::from_secs(2),
            Duration::from_secs(2),
        )
        .await;

        assert_eq!(finding.host, "127.0.0.1");
        assert_eq!(finding.port, port);
        assert!(finding.error.is_some());
        assert!(finding.protocol.is_none());
        assert!(finding.cipher_suite.is_none());
        assert!(finding.cert_subject.is_none());
        assert!(finding.cert_not_after.is_none());
    }

    #[tokio::test]
    async fn non_tls_listener_yields_handshake_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        // Accept one connection and close it without speaking TLS.
        tokio::spawn(async move {
            if let Ok((sock, _)) = listener.accept().await {
                drop(sock);
            }
        });

        let connector = discovery_connector();
        let finding = probe_endpoint(
            &connector,
            "127.0.0.1",
            port,
            Duration::from_secs(2),
            Duration::from_secs(2),
        )
        .await;

        assert!(finding.error.is_some());
        assert!(finding.protocol.is_none());
        assert!(finding.cipher_suite.is_none());
    }

    #[tokio::test]
    async fn reachable_tls_listener_yields_populated_finding() {
        let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let cert_der = certified.cert.der().clone();
        let key_der = rustls::pki_types::PrivateKeyDer::Pkcs8(
            certified.key_pair.serialize_der().into(),
        );
        let server_config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![cert_der], key_der)
            .unwrap();
        let acceptor = tokio_rustls::TlsAcceptor::from(Arc::new(server_config));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((sock, _)) = listener.accept().await {
                if let Ok(mut tls) = acceptor.accept(sock).await {
                    use tokio::io::AsyncReadExt;
                    // Hold the session open until the client hangs up.
                    let mut buf = [0u8; 1];
                    let _ = tls.read(&mut buf).await;
                }
            }
        });

        let connector = discovery_connector();
        let finding = probe_endpoint(
            &connector,
            "localhost",
            port,
            Duration::from_secs(2),
            Duration::from_secs(2),
        )
        .await;

        assert_eq!(finding.error, None);
        assert_eq!(finding.protocol.as_deref(), Some("TLSv1.3"));
        assert!(finding
            .cipher_suite
            .as_deref()
            .is_some_and(|cs| cs.starts_with("TLS_")));
        // rcgen's default distinguished name; self-signed, so issuer == subject.
        assert_eq!(finding.cert_subject.as_deref(), Some("rcgen self signed cert"));
        assert_eq!(finding.cert_issuer, finding.cert_subject);
        assert!(finding.cert_not_before.is_some());
        assert!(finding.cert_not_after.is_some());
    }

    #[test]
    fn verifier_advertises_legacy_sha1_schemes() {
        use rustls::client::danger::ServerCertVerifier;
        let schemes = AcceptAnyCert.supported_verify_schemes();
        assert!(schemes.contains(&rustls::SignatureScheme::RSA_PKCS1_SHA1));
        assert!(schemes.contains(&rustls::SignatureScheme::ECDSA_SHA1_Legacy));
    }

    #[tokio::test]
    async fn pool_preserves_target_order() {
        let p1 = unused_local_port().await;
        let p2 = unused_local_port().await;
        let targets = vec![
            Target {
                host: "127.0.0.1".to_string(),
                port: p1,
            },
            Target {
                host: "127.0.0.1".to_string(),
                port: p2,
            },
        ];

        let findings = probe_targets(
            &targets,
            8,
            Duration::from_secs(2),
            Duration::from_secs(2),
        )
        .await
        .unwrap();

        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].port, p1);
        assert_eq!(findings[1].port, p2);
        assert!(findings.iter().all(|f| f.error.is_some()));
    }

    #[test]
    fn protocol_names_are_conventional() {
        assert_eq!(protocol_name(rustls::ProtocolVersion::TLSv1_3), "TLSv1.3");
        assert_eq!(protocol_name(rustls::ProtocolVersion::TLSv1_2), "TLSv1.2");
    }

    #[test]
    fn tls13_cipher_names_are_remapped() {
        assert_eq!(
            cipher_suite_name(rustls::CipherSuite::TLS13_AES_256_GCM_SHA384),
            "TLS_AES_256_GCM_SHA384"
        );
    }
}
