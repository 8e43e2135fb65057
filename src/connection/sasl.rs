use base64::prelude::{Engine as _, BASE64_STANDARD};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::{Digest, Sha256};
use stringprep::saslprep;

use crate::connection::stream::PgStream;
use crate::error::Error;
use crate::message::{Authentication, AuthenticationSasl, SaslInitialResponse, SaslResponse};
use crate::options::PgConnectOptions;

const CHANNEL_ATTR: &str = "c";
const USERNAME_ATTR: &str = "n";
const CLIENT_PROOF_ATTR: &str = "p";
const NONCE_ATTR: &str = "r";

// https://datatracker.ietf.org/doc/html/rfc5802 (SCRAM)
// https://datatracker.ietf.org/doc/html/rfc7677 (SCRAM-SHA-256)

pub(crate) async fn authenticate(
    stream: &mut PgStream,
    options: &PgConnectOptions,
    data: AuthenticationSasl,
) -> Result<(), Error> {
    let mut has_sasl = false;
    let mut has_sasl_plus = false;
    let mut unknown = Vec::new();

    for mechanism in data.mechanisms() {
        match mechanism {
            "SCRAM-SHA-256" => has_sasl = true,
            "SCRAM-SHA-256-PLUS" => has_sasl_plus = true,
            other => unknown.push(other.to_owned()),
        }
    }

    if !has_sasl && !has_sasl_plus {
        return Err(Error::Authentication(format!(
            "unsupported SASL mechanisms: {}",
            unknown.join(", ")
        )));
    }

    // Channel binding requires both a TLS session that exposed its
    // certificate data and the server offering the -PLUS mechanism.
    let plus = has_sasl_plus && stream.channel_binding.is_some();

    // gs2-cbind-flag: "p=<name>" when binding, "n" (client does not
    // support) otherwise
    let gs2_header = if plus {
        "p=tls-server-end-point,,"
    } else {
        "n,,"
    };

    // channel-binding = "c=" base64(gs2-header [ + cbind-data ])
    let mut channel_binding = format!("{CHANNEL_ATTR}=");

    if plus {
        let mut cbind_input = gs2_header.as_bytes().to_vec();
        cbind_input.extend_from_slice(stream.channel_binding.as_deref().unwrap_or_default());
        BASE64_STANDARD.encode_string(cbind_input, &mut channel_binding);
    } else {
        BASE64_STANDARD.encode_string(gs2_header, &mut channel_binding);
    }

    // "n=" saslname ;; usernames are prepared with SASLprep
    let username = format!("{}={}", USERNAME_ATTR, options.username);
    let username = saslprep(&username)
        .map_err(|_| Error::Authentication("username failed SASLprep".into()))?;

    let nonce = gen_nonce();

    let client_first_message_bare = format!("{username},{nonce}");
    let client_first_message = format!("{gs2_header}{client_first_message_bare}");

    stream
        .send(SaslInitialResponse {
            response: &client_first_message,
            plus,
        })
        .await?;

    let cont = match stream.recv_expect().await? {
        Authentication::SaslContinue(data) => data,

        auth => {
            return Err(err_protocol!("expected SASLContinue, received {auth:?}"));
        }
    };

    // the server's nonce must extend ours
    if !cont.nonce.starts_with(&nonce[2..]) {
        return Err(Error::Authentication(
            "server nonce does not extend the client nonce".into(),
        ));
    }

    let password = options.password.as_deref().unwrap_or_default();
    let password = saslprep(password)
        .map_err(|_| Error::Authentication("password failed SASLprep".into()))?;

    // SaltedPassword := Hi(Normalize(password), salt, i)
    let salted_password = hi(&password, &cont.salt, cont.iterations).await?;

    // ClientKey := HMAC(SaltedPassword, "Client Key")
    let mut mac = Hmac::<Sha256>::new_from_slice(&salted_password).map_err(Error::protocol)?;
    mac.update(b"Client Key");
    let client_key = mac.finalize().into_bytes();

    // StoredKey := H(ClientKey)
    let stored_key = Sha256::digest(client_key);

    let client_final_message_wo_proof =
        format!("{channel_binding},r={nonce}", nonce = &cont.nonce);

    // AuthMessage := client-first-message-bare + "," +
    //                server-first-message + "," +
    //                client-final-message-without-proof
    let auth_message = format!(
        "{client_first_message_bare},{server_first},{client_final_message_wo_proof}",
        server_first = cont.message
    );

    // ClientSignature := HMAC(StoredKey, AuthMessage)
    let mut mac = Hmac::<Sha256>::new_from_slice(&stored_key).map_err(Error::protocol)?;
    mac.update(auth_message.as_bytes());
    let client_signature = mac.finalize().into_bytes();

    // ClientProof := ClientKey XOR ClientSignature
    let client_proof: Vec<u8> = client_key
        .iter()
        .zip(client_signature.iter())
        .map(|(a, b)| a ^ b)
        .collect();

    // ServerKey := HMAC(SaltedPassword, "Server Key")
    let mut mac = Hmac::<Sha256>::new_from_slice(&salted_password).map_err(Error::protocol)?;
    mac.update(b"Server Key");
    let server_key = mac.finalize().into_bytes();

    // ServerSignature := HMAC(ServerKey, AuthMessage)
    let mut mac = Hmac::<Sha256>::new_from_slice(&server_key).map_err(Error::protocol)?;
    mac.update(auth_message.as_bytes());

    let mut client_final_message =
        format!("{client_final_message_wo_proof},{CLIENT_PROOF_ATTR}=");
    BASE64_STANDARD.encode_string(client_proof, &mut client_final_message);

    stream.send(SaslResponse(&client_final_message)).await?;

    let data = match stream.recv_expect().await? {
        Authentication::SaslFinal(data) => data,

        auth => {
            return Err(err_protocol!("expected SASLFinal, received {auth:?}"));
        }
    };

    // the session is authentic only if the server proves it holds the
    // server key
    mac.verify_slice(&data.verifier)
        .map_err(|_| Error::Authentication("server signature verification failed".into()))?;

    Ok(())
}

// nonce: printable ASCII excluding ","
fn gen_nonce() -> String {
    let mut rng = rand::thread_rng();
    let count = rng.gen_range(64..128);

    let nonce: String = std::iter::repeat_with(|| {
        let mut c = rng.gen_range(0x21u8..0x7F);

        while c == 0x2C {
            c = rng.gen_range(0x21u8..0x7F);
        }

        c as char
    })
    .take(count)
    .collect();

    format!("{NONCE_ATTR}={nonce}")
}

// Hi(str, salt, i): PBKDF2-HMAC-SHA-256 with one block
async fn hi(s: &str, salt: &[u8], iterations: u32) -> Result<[u8; 32], Error> {
    let mut mac = Hmac::<Sha256>::new_from_slice(s.as_bytes()).map_err(Error::protocol)?;

    mac.update(salt);
    mac.update(&1u32.to_be_bytes());

    let mut u = mac.finalize_reset().into_bytes();
    let mut hi = u;

    for i in 1..iterations {
        mac.update(u.as_slice());
        u = mac.finalize_reset().into_bytes();

        for (h, u) in hi.iter_mut().zip(u.iter()) {
            *h ^= u;
        }

        // The default iteration count (4096) takes tens of milliseconds;
        // yield periodically so this does not monopolize the executor.
        if i % 64 == 0 {
            tokio::task::yield_now().await;
        }
    }

    Ok(hi.into())
}
