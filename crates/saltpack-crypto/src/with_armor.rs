//! Engines composed with ASCII armor
//!
//! The buffered helpers run an engine and then armor (or dearmor and then run an
//! engine). The `*_stream` constructors return a [`Pipe`] so one driver can push
//! input through both stages; `pipe.first()` and `pipe.second()` reach each stage's
//! accessors.
//!
//! Every helper forces the armor message type that belongs to its mode. On the way
//! in, framed armor must carry that type or the legacy untyped `MESSAGE`.

use saltpack_armor::{armor, dearmor, ArmorHeaderInfo, ArmorOptions, ArmorStream, DearmorStream};
use saltpack_core::{
    MessageMode, MessageType, Pipe, SaltpackError, SaltpackResult, StreamGuard, Transform,
};

use crate::encryption::{self, DecryptStream, Decrypted, EncryptStream, Recipient};
use crate::keys::{BoxKeyPair, BoxPublicKey, SigningKeyPair, SigningPublicKey};
use crate::signcryption::{
    self, Designcrypted, DesigncryptStream, RecipientKey, SigncryptRecipient, SigncryptStream,
};
use crate::signing::{self, SignStream, Verified, VerifyStream};

/// Result of a dearmor-then-open helper
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dearmored<T> {
    pub value: T,
    /// `None` for raw armor
    pub header_info: Option<ArmorHeaderInfo>,
    /// Bytes after the armor footer; `None` for raw armor
    pub remaining: Option<Vec<u8>>,
}

fn options_for(mode: MessageMode, options: &ArmorOptions) -> ArmorOptions {
    options.clone().with_message_type(mode.armor_type())
}

fn check_message_type(info: Option<&ArmorHeaderInfo>, mode: MessageMode) -> SaltpackResult<()> {
    match info {
        Some(info)
            if info.message_type != mode.armor_type()
                && info.message_type != MessageType::Message =>
        {
            Err(SaltpackError::Format(format!(
                "armored {} where {} was expected",
                info.message_type,
                mode.armor_type()
            )))
        }
        _ => Ok(()),
    }
}

fn dearmor_for<T>(
    armored: &[u8],
    mode: MessageMode,
    options: &ArmorOptions,
    open: impl FnOnce(&[u8]) -> SaltpackResult<T>,
) -> SaltpackResult<Dearmored<T>> {
    let output = dearmor(armored, &options_for(mode, options))?;
    check_message_type(output.header_info.as_ref(), mode)?;
    Ok(Dearmored {
        value: open(&output.data)?,
        header_info: output.header_info,
        remaining: output.remaining,
    })
}

/// Dearmoring stage that rejects framing for another message type as soon as the
/// header has been read.
#[derive(Debug)]
pub struct TypedDearmorStream {
    inner: DearmorStream,
    mode: MessageMode,
    checked: bool,
    guard: StreamGuard,
}

impl TypedDearmorStream {
    pub fn new(mode: MessageMode, options: &ArmorOptions) -> SaltpackResult<Self> {
        Ok(Self {
            inner: DearmorStream::new(options_for(mode, options))?,
            mode,
            checked: false,
            guard: StreamGuard::default(),
        })
    }

    pub fn header_info(&self) -> Option<&ArmorHeaderInfo> {
        self.inner.header_info()
    }

    pub fn remaining(&self) -> Option<&[u8]> {
        self.inner.remaining()
    }

    fn check_type(&mut self) -> SaltpackResult<()> {
        if !self.checked {
            if let Some(info) = self.inner.header_info() {
                check_message_type(Some(info), self.mode)?;
                self.checked = true;
            }
        }
        Ok(())
    }
}

impl Transform for TypedDearmorStream {
    fn update(&mut self, input: &[u8]) -> SaltpackResult<Vec<u8>> {
        self.guard.check()?;
        let result = self
            .inner
            .update(input)
            .and_then(|out| self.check_type().map(|()| out));
        self.guard.record(result)
    }

    fn finish(&mut self) -> SaltpackResult<Vec<u8>> {
        self.guard.check()?;
        let result = self
            .inner
            .finish()
            .and_then(|out| self.check_type().map(|()| out));
        let out = self.guard.record(result)?;
        self.guard.mark_finished();
        Ok(out)
    }
}

pub fn encrypt_and_armor(
    message: &[u8],
    sender: Option<&BoxKeyPair>,
    recipients: &[Recipient],
    options: &ArmorOptions,
) -> SaltpackResult<String> {
    let encrypted = encryption::encrypt(message, sender, recipients)?;
    armor(&encrypted, &options_for(MessageMode::Encryption, options))
}

pub fn dearmor_and_decrypt(
    armored: &[u8],
    keypair: &BoxKeyPair,
    expected_sender: Option<&BoxPublicKey>,
    options: &ArmorOptions,
) -> SaltpackResult<Dearmored<Decrypted>> {
    dearmor_for(armored, MessageMode::Encryption, options, |data| {
        encryption::decrypt(data, keypair, expected_sender)
    })
}

pub fn sign_and_armor(
    message: &[u8],
    keypair: &SigningKeyPair,
    options: &ArmorOptions,
) -> SaltpackResult<String> {
    let signed = signing::sign(message, keypair)?;
    armor(&signed, &options_for(MessageMode::AttachedSigning, options))
}

pub fn verify_armored(
    armored: &[u8],
    expected: Option<&SigningPublicKey>,
    options: &ArmorOptions,
) -> SaltpackResult<Dearmored<Verified>> {
    dearmor_for(armored, MessageMode::AttachedSigning, options, |data| {
        signing::verify(data, expected)
    })
}

pub fn sign_detached_and_armor(
    message: &[u8],
    keypair: &SigningKeyPair,
    options: &ArmorOptions,
) -> SaltpackResult<String> {
    let signature = signing::sign_detached(message, keypair)?;
    armor(&signature, &options_for(MessageMode::DetachedSigning, options))
}

pub fn verify_detached_armored(
    armored_signature: &[u8],
    message: &[u8],
    expected: Option<&SigningPublicKey>,
    options: &ArmorOptions,
) -> SaltpackResult<Dearmored<SigningPublicKey>> {
    dearmor_for(
        armored_signature,
        MessageMode::DetachedSigning,
        options,
        |signature| signing::verify_detached(signature, message, expected),
    )
}

pub fn signcrypt_and_armor(
    message: &[u8],
    sender: Option<&SigningKeyPair>,
    recipients: &[SigncryptRecipient],
    options: &ArmorOptions,
) -> SaltpackResult<String> {
    let signcrypted = signcryption::signcrypt(message, sender, recipients)?;
    armor(&signcrypted, &options_for(MessageMode::Signcryption, options))
}

pub fn dearmor_and_designcrypt(
    armored: &[u8],
    keys: &[RecipientKey],
    expected_sender: Option<&SigningPublicKey>,
    options: &ArmorOptions,
) -> SaltpackResult<Dearmored<Designcrypted>> {
    dearmor_for(armored, MessageMode::Signcryption, options, |data| {
        signcryption::designcrypt(data, keys, expected_sender)
    })
}

pub fn encrypt_and_armor_stream(
    sender: Option<&BoxKeyPair>,
    recipients: &[Recipient],
    options: &ArmorOptions,
) -> SaltpackResult<Pipe<EncryptStream, ArmorStream>> {
    Ok(Pipe::new(
        EncryptStream::new(sender, recipients)?,
        ArmorStream::new(options_for(MessageMode::Encryption, options))?,
    ))
}

pub fn dearmor_and_decrypt_stream(
    keypair: &BoxKeyPair,
    expected_sender: Option<&BoxPublicKey>,
    options: &ArmorOptions,
) -> SaltpackResult<Pipe<TypedDearmorStream, DecryptStream>> {
    Ok(Pipe::new(
        TypedDearmorStream::new(MessageMode::Encryption, options)?,
        DecryptStream::new(keypair, expected_sender),
    ))
}

pub fn sign_and_armor_stream(
    keypair: &SigningKeyPair,
    options: &ArmorOptions,
) -> SaltpackResult<Pipe<SignStream, ArmorStream>> {
    Ok(Pipe::new(
        SignStream::new(keypair)?,
        ArmorStream::new(options_for(MessageMode::AttachedSigning, options))?,
    ))
}

pub fn dearmor_and_verify_stream(
    expected: Option<&SigningPublicKey>,
    options: &ArmorOptions,
) -> SaltpackResult<Pipe<TypedDearmorStream, VerifyStream>> {
    Ok(Pipe::new(
        TypedDearmorStream::new(MessageMode::AttachedSigning, options)?,
        VerifyStream::new(expected),
    ))
}

pub fn signcrypt_and_armor_stream(
    sender: Option<&SigningKeyPair>,
    recipients: &[SigncryptRecipient],
    options: &ArmorOptions,
) -> SaltpackResult<Pipe<SigncryptStream, ArmorStream>> {
    Ok(Pipe::new(
        SigncryptStream::new(sender, recipients)?,
        ArmorStream::new(options_for(MessageMode::Signcryption, options))?,
    ))
}

pub fn dearmor_and_designcrypt_stream(
    keys: &[RecipientKey],
    expected_sender: Option<&SigningPublicKey>,
    options: &ArmorOptions,
) -> SaltpackResult<Pipe<TypedDearmorStream, DesigncryptStream>> {
    Ok(Pipe::new(
        TypedDearmorStream::new(MessageMode::Signcryption, options)?,
        DesigncryptStream::new(keys, expected_sender),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use saltpack_core::transform::run;

    const MESSAGE: &[u8] = b"hello armored world";

    #[test]
    fn encrypt_and_armor_round_trip() {
        let alice = BoxKeyPair::generate();
        let bob = BoxKeyPair::generate();
        let options = ArmorOptions::default();

        let armored =
            encrypt_and_armor(MESSAGE, Some(&alice), &[bob.public_key().into()], &options).unwrap();
        assert!(armored.starts_with("BEGIN SALTPACK ENCRYPTED MESSAGE. "));
        assert!(armored.ends_with(". END SALTPACK ENCRYPTED MESSAGE."));

        let opened = dearmor_and_decrypt(armored.as_bytes(), &bob, None, &options).unwrap();
        assert_eq!(opened.value.data, MESSAGE);
        assert_eq!(opened.value.sender, alice.public_key());
        assert_eq!(
            opened.header_info.unwrap().message_type,
            MessageType::EncryptedMessage
        );
        assert_eq!(opened.remaining, Some(Vec::new()));
    }

    #[test]
    fn wrong_armor_type_is_rejected() {
        let keypair = SigningKeyPair::generate();
        let options = ArmorOptions::default();
        let armored = sign_and_armor(MESSAGE, &keypair, &options).unwrap();
        assert!(armored.starts_with("BEGIN SALTPACK SIGNED MESSAGE. "));

        assert!(verify_armored(armored.as_bytes(), None, &options).is_ok());
        let err = dearmor_and_decrypt(
            armored.as_bytes(),
            &BoxKeyPair::generate(),
            None,
            &options,
        )
        .unwrap_err();
        assert!(matches!(err, SaltpackError::Format(_)));
    }

    #[test]
    fn legacy_untyped_armor_is_accepted() {
        let keypair = SigningKeyPair::generate();
        let signed = signing::sign(MESSAGE, &keypair).unwrap();
        let armored = armor(&signed, &ArmorOptions::default()).unwrap();
        assert!(armored.starts_with("BEGIN SALTPACK MESSAGE. "));

        let verified = verify_armored(armored.as_bytes(), None, &ArmorOptions::default()).unwrap();
        assert_eq!(verified.value.data, MESSAGE);
    }

    #[test]
    fn detached_signature_with_app_name_and_trailing_text() {
        let keypair = SigningKeyPair::generate();
        let options = ArmorOptions::default().with_app_name("KEYBASE");
        let mut armored = sign_detached_and_armor(MESSAGE, &keypair, &options).unwrap();
        assert!(armored.starts_with("BEGIN KEYBASE SALTPACK DETACHED SIGNATURE. "));
        armored.push_str("\nsigned by alice");

        let checked =
            verify_detached_armored(armored.as_bytes(), MESSAGE, None, &options).unwrap();
        assert_eq!(checked.value, keypair.public_key());
        assert_eq!(
            checked.header_info.unwrap().app_name.as_deref(),
            Some("KEYBASE")
        );
        assert_eq!(checked.remaining.unwrap(), b"\nsigned by alice");
    }

    #[test]
    fn raw_signcryption_has_no_framing() {
        let bob = BoxKeyPair::generate();
        let options = ArmorOptions::default().with_raw(true);
        let armored = signcrypt_and_armor(MESSAGE, None, &[bob.public_key().into()], &options)
            .unwrap();
        assert!(!armored.contains("SALTPACK"));

        let opened =
            dearmor_and_designcrypt(armored.as_bytes(), &[bob.into()], None, &options).unwrap();
        assert_eq!(opened.value.data, MESSAGE);
        assert_eq!(opened.value.sender, None);
        assert_eq!(opened.header_info, None);
        assert_eq!(opened.remaining, None);
    }

    #[test]
    fn streaming_pipes_round_trip() {
        let alice = BoxKeyPair::generate();
        let bob = BoxKeyPair::generate();
        let options = ArmorOptions::default();

        let mut sealer =
            encrypt_and_armor_stream(Some(&alice), &[bob.public_key().into()], &options).unwrap();
        let mut armored = Vec::new();
        for piece in MESSAGE.chunks(4) {
            armored.extend(sealer.update(piece).unwrap());
        }
        armored.extend(sealer.finish().unwrap());

        let mut opener = dearmor_and_decrypt_stream(&bob, Some(&alice.public_key()), &options)
            .unwrap();
        let data = run(&mut opener, &armored).unwrap();
        assert_eq!(data, MESSAGE);
        assert_eq!(opener.second().sender_public_key(), Some(alice.public_key()));
        assert_eq!(
            opener.first().header_info().map(|i| i.message_type),
            Some(MessageType::EncryptedMessage)
        );

        let signer = SigningKeyPair::generate();
        let signed = run(&mut sign_and_armor_stream(&signer, &options).unwrap(), MESSAGE).unwrap();
        let mut verifier = dearmor_and_verify_stream(None, &options).unwrap();
        assert_eq!(run(&mut verifier, &signed).unwrap(), MESSAGE);
        assert_eq!(verifier.second().public_key(), Some(signer.public_key()));

        let sealed = run(
            &mut signcrypt_and_armor_stream(Some(&signer), &[bob.public_key().into()], &options)
                .unwrap(),
            MESSAGE,
        )
        .unwrap();
        let mut opener = dearmor_and_designcrypt_stream(&[bob.into()], None, &options).unwrap();
        assert_eq!(run(&mut opener, &sealed).unwrap(), MESSAGE);
        assert_eq!(opener.second().sender_public_key(), Some(signer.public_key()));
    }

    #[test]
    fn streaming_dearmor_rejects_wrong_type_early() {
        let signer = SigningKeyPair::generate();
        let options = ArmorOptions::default();
        let signed = sign_and_armor(MESSAGE, &signer, &options).unwrap();
        let header_end = signed.find('.').unwrap() + 1;

        let mut opener =
            dearmor_and_decrypt_stream(&BoxKeyPair::generate(), None, &options).unwrap();
        let err = opener.update(&signed.as_bytes()[..header_end]).unwrap_err();
        assert!(matches!(err, SaltpackError::Format(_)));
        assert!(matches!(
            opener.update(b"more"),
            Err(SaltpackError::StreamFailed(_))
        ));
    }
}
