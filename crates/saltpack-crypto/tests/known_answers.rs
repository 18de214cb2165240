//! Known-answer vectors for every message mode

mod common;

use common::*;
use saltpack_crypto::{
    decrypt, designcrypt, encrypt_with_keys, sign_detached_with_nonce, sign_with_nonce,
    signcrypt_with_keys, verify, verify_detached, BoxPublicKey, PaperKey, PaperKeyParams,
    SigncryptRecipient, SigningKeyPair, SigningPublicKey,
};
use secrecy::SecretString;

const ENCRYPTED: &str = "c4b896a873616c747061636b92020000c4205bf55c73b82ebe22be80f3430667af570fae2556a6415e6b30d4065300aa947dc43094992d83ef6d054728b19b77f91640d4b6fc921440138f7d571fb1796e44fd8f780f153e4507d3ed7f500b48b6e752df9192c42060346e7c911a5f6ba154129174cafe75b294ac3bbd5549632f48cec6266f8410c4302159708fbf1824787d5872df43734dd567672f70eab9663ef62165ca5653e24de796b9f2951c87971d4c23a649984dc693c391c42020755fe80a6ccb4486993bf69cc8f5050f26ec8850fb776fca4ce22ef665f056c4c64d6cbc4477493be11cb91110ead53afd99f227025700b3d93f6fea2f2bcd905c170488bbb342b33fad6c3b8037e787d7f310a6a4240bfaca5ba3867e42a685a0de9eb12c5c7d51b13749c5e7607e5ab187b584e0bc35ac6a9b17e3a1bd717fb4f7c6ffad48afad5fa1d44faef31554c2fce0f2dbc6a215761eb10e664bd353156eb13da776b51c049d1ead133542cbdf8b5ffb124bbe82184bce9c0d9da6110e47f69a40d3c365f9c2e3fc4178ac36deadd61bbc0817a8cf7cf5bf944c228be675888b05c84e";

const SIGNED: &str = "c45295a873616c747061636b92020001c4203b6a27bcceb6a42d62a3a8d02a6f0d73653215771de243a63ac048a18b59da29c420000000000000000000000000000000000000000000000000000000000000000093c3c4404a77380837fb4ec62480e76c59b735a6287e85b54afe7793531ff70076c51fc23b1f078e6700b85beb9fc091d69c8826b5268765b7eded317d943fed99bb560fc4b654776f20726f61647320646976657267656420696e20612079656c6c6f7720776f6f642c20616e6420736f727279204920636f756c64206e6f742074726176656c20626f74680a616e64206265206f6e652074726176656c6c65722c206c6f6e6720492073746f6f642c20616e64206c6f6f6b656420646f776e206f6e652061732066617220617320490a636f756c642c20746f2077686572652069742062656e7420696e2074686520756e64657267726f7774682e";

const DETACHED: &str = "c45295a873616c747061636b92020002c4203b6a27bcceb6a42d62a3a8d02a6f0d73653215771de243a63ac048a18b59da29c4200000000000000000000000000000000000000000000000000000000000000000c4403d452b27bfc69543e20cbf3a139fd689450f26e4084660f66090de422f2e438931efd159c9101c99e070f3de277330b51940a7583f8c925085b1f86f38693f06";

const SIGNCRYPTED: &str = "c4b896a873616c747061636b92020003c4205bf55c73b82ebe22be80f3430667af570fae2556a6415e6b30d4065300aa947dc43082818f5a22d20865c91ea58d3d7b089d276f291464f06a5ea7ec112d5e2e87a96b18d53be0f72a454cd78226e7f502d49192c420b7e814fc879ff6cc22f84fcb0f8df163322d7c81281eb55257d7e7bfce8703bbc430d39daa6727cbe03f88442d7c49e74d3dfda0351d4168df28886c75d64c72d1197519f59eee015bebbde222569f92950192c5010678aa3d7d9526938b9512fc67a5d99d6f71c86725d2406e090569b5feda4594a6048b356c97bb0798f32921e41bd96b5c07cdcb35b805e49535667373b4ad42d121aaeb9ef1d55ef22f70a6e7410b9133f8e5e94bcf6b96d671ba1015f3255aa9f6a3c6a2944c7569ae2c0269698ddd8dfcce59dc2fcc8b370b3df76afb4fe9606f57352baf62f718a37ca0e4b8bc50d85aa49db9919e3908c3d600ff84cd0c65395e3f62a5288e0e65b46a039db37a0c53416a31015c30a5209bcd31a862f0180d8d9b4aedc587eb97aad8f89fdaaf7a13e71f23ecf6657def54a8f4e56c641c8cd6d8540dcd88e5c8d8f5d4e79782db8516c53bee1e3689d089fb46c8de1bd959509a87d52ec3";

const ZERO_SEED_PUBLIC: &str = "3b6a27bcceb6a42d62a3a8d02a6f0d73653215771de243a63ac048a18b59da29";
const ONE_SEED_PUBLIC: &str = "8a88e3dd7409f195fd52db2d3cba5d72ca6709bf1d94121bf3748801b40f6f5c";

#[test]
fn fixture_public_keys() {
    assert_eq!(
        alice().public_key(),
        BoxPublicKey::from_bytes(key32(
            "1b1b58dd50ea14b60da17b790cd02754d970c9bab864ebb3c0f3016fe51d3f57"
        ))
    );
    assert_eq!(
        bob().public_key(),
        BoxPublicKey::from_bytes(key32(
            "60346e7c911a5f6ba154129174cafe75b294ac3bbd5549632f48cec6266f8410"
        ))
    );
    assert_eq!(
        fixture_keys().ephemeral.public_key(),
        BoxPublicKey::from_bytes(key32(
            "5bf55c73b82ebe22be80f3430667af570fae2556a6415e6b30d4065300aa947d"
        ))
    );
}

#[test]
fn encryption_known_answer() {
    let encrypted = encrypt_with_keys(
        INPUT_STRING.as_bytes(),
        Some(&alice()),
        &[bob().public_key().into()],
        fixture_keys(),
    )
    .unwrap();
    assert_eq!(hex::encode(&encrypted), ENCRYPTED);

    let decrypted = decrypt(&hex::decode(ENCRYPTED).unwrap(), &bob(), None).unwrap();
    assert_eq!(decrypted.data, INPUT_STRING.as_bytes());
    assert_eq!(decrypted.sender, alice().public_key());
    assert!(!decrypted.anonymous_sender);
}

#[test]
fn attached_signing_known_answer() {
    let keypair = SigningKeyPair::from_seed(&[0u8; 32]);
    assert_eq!(
        keypair.public_key(),
        SigningPublicKey::from_bytes(key32(ZERO_SEED_PUBLIC))
    );

    let signed = sign_with_nonce(INPUT_STRING.as_bytes(), &keypair, [0u8; 32]).unwrap();
    assert_eq!(hex::encode(&signed), SIGNED);

    let verified = verify(&hex::decode(SIGNED).unwrap(), None).unwrap();
    assert_eq!(verified.data, INPUT_STRING.as_bytes());
    assert_eq!(verified.public_key, keypair.public_key());
}

#[test]
fn detached_signing_known_answer() {
    let keypair = SigningKeyPair::from_seed(&[0u8; 32]);
    let signature =
        sign_detached_with_nonce(INPUT_STRING.as_bytes(), &keypair, [0u8; 32]).unwrap();
    assert_eq!(hex::encode(&signature), DETACHED);

    let key = verify_detached(
        &hex::decode(DETACHED).unwrap(),
        INPUT_STRING.as_bytes(),
        Some(&keypair.public_key()),
    )
    .unwrap();
    assert_eq!(key, keypair.public_key());
}

#[test]
fn signcryption_known_answer() {
    let sender = SigningKeyPair::from_seed(&[1u8; 32]);
    assert_eq!(
        sender.public_key(),
        SigningPublicKey::from_bytes(key32(ONE_SEED_PUBLIC))
    );

    let signcrypted = signcrypt_with_keys(
        INPUT_STRING.as_bytes(),
        Some(&sender),
        &[SigncryptRecipient::Curve25519(bob().public_key())],
        fixture_keys(),
    )
    .unwrap();
    assert_eq!(hex::encode(&signcrypted), SIGNCRYPTED);

    let opened = designcrypt(&hex::decode(SIGNCRYPTED).unwrap(), &[bob().into()], None).unwrap();
    assert_eq!(opened.data, INPUT_STRING.as_bytes());
    assert_eq!(opened.sender, Some(sender.public_key()));
}

#[test]
fn paper_key_known_answer() {
    let phrase = SecretString::from("carpet human spirit wagon beach robust table actor ocean");
    let paper_key = PaperKey::derive(&phrase, &PaperKeyParams::default()).unwrap();

    assert_eq!(paper_key.label(), Some("carpet human"));
    assert_eq!(
        paper_key.signing_keypair().public_key(),
        SigningPublicKey::from_bytes(key32(
            "8fb5f5dcab48ee952f0254bf0a2ed9cc95198443644dc8df07ff6c8f3e4856f6"
        ))
    );
    assert_eq!(
        paper_key.encryption_keypair().secret_key().as_bytes(),
        &key32("ec54e1c1341ddc3c7ea071b660819b5742f07c32c5ac7bd3258c3b9931e6c96e")
    );
    assert_eq!(
        paper_key.encryption_keypair().public_key(),
        BoxPublicKey::from_bytes(key32(
            "ed9c746b33552d1f6000995ad96dfec4357a469f0b6647f4ac5be50dfdbca731"
        ))
    );
    assert_eq!(
        paper_key.signing_keypair().public_key(),
        SigningKeyPair::from_seed(&key32(
            "8859e9694b605d97cde764fd90a705e994f655706cc2da745c3d9d1563180e61"
        ))
        .public_key()
    );
}
