//! ElligatorSwift (EllSwift) encoding of secp256k1 public keys.
//!
//! A public key is represented as two field elements `(u, t)`, serialized
//! as 64 bytes `u || t` big-endian. The map from `(u, t)` to an X
//! coordinate is total: every 64-byte string decodes to a valid curve
//! point, and a correctly sampled encoding is computationally
//! indistinguishable from 64 uniform random bytes.
//!
//! The inverse direction ("find a `t` for this `(u, x)`") has eight
//! algebraic branches, indexed 0..7. Encoding picks a uniform `u` and a
//! uniform branch and retries until the branch has a solution, which is
//! what makes the output distribution uniform.

use core::ops::Add;
use k256::elliptic_curve::bigint::ArrayEncoding;
use k256::elliptic_curve::ops::Reduce;
use k256::elliptic_curve::point::DecompressPoint;
use k256::elliptic_curve::rand_core::CryptoRngCore;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::elliptic_curve::subtle::Choice;
use k256::{AffinePoint, FieldElement, ProjectivePoint, PublicKey, Scalar, U256};
use zeroize::Zeroize;

use crate::error::ShroudCryptoError;

/// Size of an EllSwift-encoded public key on the wire.
pub const ELLSWIFT_ENCODED_SIZE: usize = 64;

/// `sqrt(-3)` mod p. Root fixed by `(-3)^((p+1)/4)`.
const SQRT_MINUS_3: [u8; 32] = [
    0x0a, 0x2d, 0x2b, 0xa9, 0x35, 0x07, 0xf1, 0xdf, 0x23, 0x37, 0x70, 0xc2, 0xa7, 0x97, 0x96,
    0x2c, 0xc6, 0x1f, 0x6d, 0x15, 0xda, 0x14, 0xec, 0xd4, 0x7d, 0x8d, 0x27, 0xae, 0x1c, 0xd5,
    0xf8, 0x52,
];

/// The field modulus p, for reducing wire-encoded field elements.
const FIELD_MODULUS: U256 =
    U256::from_be_hex("fffffffffffffffffffffffffffffffffffffffffffffffffffffffefffffc2f");

/// An EllSwift-encoded secp256k1 public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EllSwiftPubKey {
    bytes: [u8; ELLSWIFT_ENCODED_SIZE],
}

impl EllSwiftPubKey {
    /// Wrap an existing 64-byte encoding. Never fails: all 64-byte strings
    /// are valid encodings.
    pub fn from_array(bytes: [u8; ELLSWIFT_ENCODED_SIZE]) -> Self {
        Self { bytes }
    }

    /// Wrap an encoding received off the wire.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ShroudCryptoError> {
        let bytes: [u8; ELLSWIFT_ENCODED_SIZE] = bytes
            .try_into()
            .map_err(|_| ShroudCryptoError::InvalidEllSwiftLength(bytes.len()))?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; ELLSWIFT_ENCODED_SIZE] {
        &self.bytes
    }

    /// Encode a public key, consuming randomness from `rng`.
    ///
    /// Samples `(u, branch)` uniformly and retries until the branch has a
    /// solution. Expected number of iterations is small (< 4 on average).
    pub fn encode(pubkey: &PublicKey, rng: &mut impl CryptoRngCore) -> Self {
        let point = pubkey.to_encoded_point(false);
        let x_bytes = point.x().expect("public keys are never the identity");
        let x = Option::<FieldElement>::from(FieldElement::from_bytes(x_bytes))
            .expect("SEC1 X coordinate is a canonical field element");

        loop {
            let mut u_bytes = [0u8; 32];
            rng.fill_bytes(&mut u_bytes);
            let u = match Option::<FieldElement>::from(FieldElement::from_bytes(&u_bytes.into()))
            {
                Some(u) if !bool::from(u.is_zero()) => u,
                _ => continue,
            };
            let case = (rng.next_u32() & 7) as u8;
            if let Some(t) = xswiftec_inv(&x, &u, case) {
                let mut bytes = [0u8; ELLSWIFT_ENCODED_SIZE];
                bytes[..32].copy_from_slice(&u.normalize().to_bytes());
                bytes[32..].copy_from_slice(&t.normalize().to_bytes());
                return Self { bytes };
            }
        }
    }

    /// Decode to a public key. Total: succeeds for every 64-byte input.
    ///
    /// The Y coordinate is fixed to the even root.
    pub fn decode(&self) -> PublicKey {
        let u = fe_from_bytes_reduced(&self.bytes[..32]);
        let t = fe_from_bytes_reduced(&self.bytes[32..]);
        let x = xswiftec(&u, &t).normalize();
        let affine = Option::<AffinePoint>::from(AffinePoint::decompress(
            &x.to_bytes(),
            Choice::from(0),
        ))
        .expect("xswiftec always produces a curve X coordinate");
        PublicKey::from_affine(affine).expect("decompressed point is never the identity")
    }
}

/// Derive the EllSwift encoding of `seckey`'s public key.
pub fn ellswift_create(
    seckey: &[u8; 32],
    rng: &mut impl CryptoRngCore,
) -> Result<EllSwiftPubKey, ShroudCryptoError> {
    let scalar = scalar_from_bytes(seckey)?;
    let point = (ProjectivePoint::GENERATOR * scalar).to_affine();
    let pubkey = PublicKey::from_affine(point)
        .expect("nonzero scalar times the generator is never the identity");
    Ok(EllSwiftPubKey::encode(&pubkey, rng))
}

/// X-only ECDH directly over EllSwift encodings.
///
/// Decodes `theirs`, multiplies by `seckey`, and feeds the shared X
/// coordinate plus both encodings to `hasher`. The hasher hook exists so
/// the final secret is bound to the exact bytes exchanged on the wire,
/// not merely to the curve point; tests substitute a hasher that returns
/// the X coordinate unchanged.
pub fn ellswift_xdh<H>(
    seckey: &[u8; 32],
    theirs: &EllSwiftPubKey,
    ours: &EllSwiftPubKey,
    hasher: H,
) -> Result<[u8; 32], ShroudCryptoError>
where
    H: FnOnce(&[u8; 32], &EllSwiftPubKey, &EllSwiftPubKey) -> [u8; 32],
{
    let scalar = scalar_from_bytes(seckey)?;
    let peer = theirs.decode();
    let shared = (peer.to_projective() * scalar).to_affine();
    if shared == AffinePoint::IDENTITY {
        return Err(ShroudCryptoError::EcdhZeroPoint);
    }
    let mut x32 = [0u8; 32];
    x32.copy_from_slice(
        shared
            .to_encoded_point(false)
            .x()
            .expect("point is not the identity"),
    );
    let secret = hasher(&x32, ours, theirs);
    x32.zeroize();
    Ok(secret)
}

fn scalar_from_bytes(seckey: &[u8; 32]) -> Result<Scalar, ShroudCryptoError> {
    let scalar = <Scalar as Reduce<U256>>::reduce_bytes(seckey.into());
    if bool::from(scalar.is_zero()) {
        return Err(ShroudCryptoError::EcdhZeroScalar);
    }
    Ok(scalar)
}

/// Parse 32 big-endian bytes as a field element, reducing mod p.
/// Wire encodings may carry values in `[p, 2^256)`.
fn fe_from_bytes_reduced(bytes: &[u8]) -> FieldElement {
    let array: [u8; 32] = bytes.try_into().expect("caller passes 32 bytes");
    Option::<FieldElement>::from(FieldElement::from_bytes(&array.into())).unwrap_or_else(|| {
        let reduced = U256::from_be_slice(&array).wrapping_sub(&FIELD_MODULUS);
        Option::<FieldElement>::from(FieldElement::from_bytes(&reduced.to_be_byte_array()))
            .expect("value reduced below the field modulus")
    })
}

fn sqrt_minus_three() -> FieldElement {
    Option::<FieldElement>::from(FieldElement::from_bytes(&SQRT_MINUS_3.into()))
        .expect("constant is a canonical field element")
}

fn fe_inv(fe: &FieldElement) -> FieldElement {
    Option::<FieldElement>::from(fe.normalize().invert())
        .expect("inverting a nonzero field element")
}

fn fe_inv_checked(fe: &FieldElement) -> Option<FieldElement> {
    Option::<FieldElement>::from(fe.normalize().invert())
}

fn fe_sqrt(fe: &FieldElement) -> Option<FieldElement> {
    Option::<FieldElement>::from(fe.normalize().sqrt()).map(|r| r.normalize())
}

/// Whether `x` is the X coordinate of a curve point, i.e. `x^3 + 7` is a
/// quadratic residue.
fn is_valid_x(x: &FieldElement) -> bool {
    fe_sqrt(&x.square().mul(x).add(&FieldElement::from_u64(7)).normalize()).is_some()
}

/// Forward map: `(u, t) -> x`. Total by construction.
pub(crate) fn xswiftec(u0: &FieldElement, t0: &FieldElement) -> FieldElement {
    let seven = FieldElement::from_u64(7);
    let mut u = u0.normalize();
    if bool::from(u.is_zero()) {
        u = FieldElement::ONE;
    }
    let mut t = t0.normalize();
    if bool::from(t.is_zero()) {
        t = FieldElement::ONE;
    }
    let u3p7 = u.square().mul(&u).add(&seven).normalize();
    if bool::from(u3p7.add(&t.square()).normalizes_to_zero()) {
        t = t.double().normalize();
    }
    // X = (u^3 + 7 - t^2) / (2t); Y = (X + t) / (sqrt(-3) * u).
    // The substitutions above guarantee every denominator is nonzero.
    let big_x = u3p7
        .add(&t.square().negate(1))
        .normalize()
        .mul(&fe_inv(&t.double()));
    let big_y = big_x
        .add(&t)
        .normalize()
        .mul(&fe_inv(&sqrt_minus_three().mul(&u)));

    // Candidates x3 = u + 4Y^2, x2 = (-X/Y - u)/2, x1 = (X/Y - u)/2.
    // At least one is always on the curve; x3 is checked first.
    let x3 = u.add(&big_y.square().double().double()).normalize();
    if is_valid_x(&x3) {
        return x3;
    }
    let two_inv = fe_inv(&FieldElement::from_u64(2));
    let q = big_x.mul(&fe_inv(&big_y));
    let x2 = q
        .add(&u)
        .normalize()
        .negate(1)
        .normalize()
        .mul(&two_inv)
        .normalize();
    if is_valid_x(&x2) {
        return x2;
    }
    let x1 = q.add(&u.negate(1)).normalize().mul(&two_inv).normalize();
    debug_assert!(is_valid_x(&x1));
    x1
}

/// Inverse map: find `t` such that `xswiftec(u, t) = x`, for one of the
/// eight branches. Returns `None` when the branch has no solution; the
/// branches together cover every preimage exactly once.
pub(crate) fn xswiftec_inv(
    x: &FieldElement,
    u: &FieldElement,
    case: u8,
) -> Option<FieldElement> {
    debug_assert!(case < 8);
    let seven = FieldElement::from_u64(7);
    let two_inv = fe_inv(&FieldElement::from_u64(2));
    let x = x.normalize();
    let u = u.normalize();

    let s;
    let v;
    if case & 2 == 0 {
        // Branches into x1/x2. These preimages exist only when -x-u is
        // not itself a valid X coordinate (else the x3 branch would have
        // won in the forward direction).
        let minus_x_minus_u = x.add(&u).normalize().negate(1).normalize();
        if is_valid_x(&minus_x_minus_u) {
            return None;
        }
        v = if case & 1 == 0 { minus_x_minus_u } else { x };
        // s = -(u^3 + 7) / (u^2 + u*v + v^2)
        let u3p7 = u.square().mul(&u).add(&seven).normalize();
        let denom = u.square().add(&u.mul(&v)).add(&v.square()).normalize();
        s = u3p7
            .negate(1)
            .normalize()
            .mul(&fe_inv_checked(&denom)?)
            .normalize();
    } else {
        // Branches into x3.
        s = x.add(&u.negate(1)).normalize();
        if bool::from(s.is_zero()) {
            return None;
        }
        // r = sqrt(-s * (4*(u^3 + 7) + 3*s*u^2))
        let u3p7 = u.square().mul(&u).add(&seven).normalize();
        let su2 = s.mul(&u.square());
        let inner = u3p7
            .double()
            .double()
            .add(&su2.double())
            .add(&su2)
            .normalize();
        let r2 = inner.mul(&s).negate(1).normalize();
        let r = fe_sqrt(&r2)?;
        if case & 1 == 1 && bool::from(r.is_zero()) {
            // r = 0 yields the same t in both sub-branches; only one may
            // claim it so the preimage count stays exact.
            return None;
        }
        let r = if case & 1 == 0 {
            r.negate(1).normalize()
        } else {
            r
        };
        // v = (r/s - u) / 2
        v = r
            .mul(&fe_inv(&s))
            .add(&u.negate(1))
            .normalize()
            .mul(&two_inv)
            .normalize();
    }

    let mut w = fe_sqrt(&s)?;
    if case & 4 != 0 {
        w = w.negate(1).normalize();
    }
    // t = w * (u*(1 + sqrt(-3))/2 + v)
    let coeff = FieldElement::ONE
        .add(&sqrt_minus_three())
        .normalize()
        .mul(&two_inv);
    Some(w.mul(&coeff.mul(&u).add(&v).normalize()).normalize())
}
