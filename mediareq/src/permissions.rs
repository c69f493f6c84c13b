//! User capability bits and permission checks.
//!
//! A user's authority is stored as a single integer bitmask. Each bit grants
//! one class of action. Two grants are implied rather than stored:
//! `ADMIN` satisfies every check, and `MANAGE_REQUESTS` satisfies every
//! `AUTO_APPROVE*` check.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Capability bitmask stored on a user account.
    ///
    /// Bit values are part of the stored data format and must never be
    /// renumbered.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Permissions: u32 {
        /// Full administrative access. Satisfies every other check.
        const ADMIN = 1 << 1;
        /// Manage application settings.
        const MANAGE_SETTINGS = 1 << 2;
        /// Manage user accounts.
        const MANAGE_USERS = 1 << 3;
        /// Approve, decline, and edit media requests.
        const MANAGE_REQUESTS = 1 << 4;
        /// Submit media requests.
        const REQUEST = 1 << 5;
        /// Requests are approved without review.
        const AUTO_APPROVE = 1 << 7;
        /// Movie requests are approved without review.
        const AUTO_APPROVE_MOVIE = 1 << 8;
        /// Series requests are approved without review.
        const AUTO_APPROVE_TV = 1 << 9;
        /// Submit 4K media requests.
        const REQUEST_4K = 1 << 10;
        /// Submit 4K movie requests.
        const REQUEST_4K_MOVIE = 1 << 11;
        /// Submit 4K series requests.
        const REQUEST_4K_TV = 1 << 12;
        /// Modify advanced request options (server, profile, path).
        const REQUEST_ADVANCED = 1 << 13;
        /// View requests submitted by other users.
        const REQUEST_VIEW = 1 << 14;
        /// 4K requests are approved without review.
        const AUTO_APPROVE_4K = 1 << 15;
        /// 4K movie requests are approved without review.
        const AUTO_APPROVE_4K_MOVIE = 1 << 16;
        /// 4K series requests are approved without review.
        const AUTO_APPROVE_4K_TV = 1 << 17;
        /// Submit movie requests.
        const REQUEST_MOVIE = 1 << 18;
        /// Submit series requests.
        const REQUEST_TV = 1 << 19;
        /// Manage and resolve media issues.
        const MANAGE_ISSUES = 1 << 20;
        /// View media issues.
        const VIEW_ISSUES = 1 << 21;
        /// Report media issues.
        const CREATE_ISSUES = 1 << 22;
    }
}

impl Permissions {
    /// Every auto-approval capability, implied as a whole by `MANAGE_REQUESTS`.
    pub const AUTO_APPROVE_ALL: Self = Self::AUTO_APPROVE
        .union(Self::AUTO_APPROVE_MOVIE)
        .union(Self::AUTO_APPROVE_TV)
        .union(Self::AUTO_APPROVE_4K)
        .union(Self::AUTO_APPROVE_4K_MOVIE)
        .union(Self::AUTO_APPROVE_4K_TV);
}

/// How a multi-bit requirement is evaluated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PermissionCheck {
    /// Every required bit must be satisfied.
    #[default]
    All,
    /// At least one required bit must be satisfied.
    Any,
}

/// Check whether `granted` satisfies `required`.
///
/// `ADMIN` in `granted` passes unconditionally. An `AUTO_APPROVE*` requirement
/// also passes when `granted` holds `MANAGE_REQUESTS`; that implication is
/// evaluated before the plain bit test. Unknown bits in either mask simply
/// never match. Pure and side-effect free.
#[must_use]
pub fn has_permission(
    required: Permissions,
    granted: Permissions,
    check: PermissionCheck,
) -> bool {
    if granted.contains(Permissions::ADMIN) {
        return true;
    }

    if required.is_empty() {
        return false;
    }

    let satisfies = |bit: Permissions| {
        if Permissions::AUTO_APPROVE_ALL.contains(bit)
            && granted.contains(Permissions::MANAGE_REQUESTS)
        {
            return true;
        }
        granted.intersects(bit)
    };

    match check {
        PermissionCheck::All => required.iter().all(satisfies),
        PermissionCheck::Any => required.iter().any(satisfies),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Permissions::MANAGE_SETTINGS)]
    #[case(Permissions::MANAGE_USERS)]
    #[case(Permissions::MANAGE_REQUESTS)]
    #[case(Permissions::REQUEST)]
    #[case(Permissions::REQUEST_4K_TV)]
    #[case(Permissions::AUTO_APPROVE_4K_MOVIE)]
    #[case(Permissions::MANAGE_ISSUES)]
    #[case(Permissions::CREATE_ISSUES)]
    fn admin_satisfies_everything(#[case] required: Permissions) {
        let granted = Permissions::ADMIN;
        assert!(has_permission(required, granted, PermissionCheck::All));
        assert!(has_permission(required, granted, PermissionCheck::Any));
    }

    #[rstest]
    #[case(Permissions::AUTO_APPROVE)]
    #[case(Permissions::AUTO_APPROVE_MOVIE)]
    #[case(Permissions::AUTO_APPROVE_TV)]
    #[case(Permissions::AUTO_APPROVE_4K)]
    #[case(Permissions::AUTO_APPROVE_4K_MOVIE)]
    #[case(Permissions::AUTO_APPROVE_4K_TV)]
    fn manage_requests_implies_auto_approve(#[case] required: Permissions) {
        let granted = Permissions::MANAGE_REQUESTS;
        assert!(!granted.contains(required));
        assert!(has_permission(required, granted, PermissionCheck::All));
    }

    #[test]
    fn plain_bit_match() {
        let granted = Permissions::REQUEST | Permissions::REQUEST_MOVIE;
        assert!(has_permission(
            Permissions::REQUEST,
            granted,
            PermissionCheck::All
        ));
        assert!(!has_permission(
            Permissions::REQUEST_4K,
            granted,
            PermissionCheck::All
        ));
    }

    #[test]
    fn all_requires_every_bit() {
        let granted = Permissions::REQUEST;
        let required = Permissions::REQUEST | Permissions::REQUEST_4K;
        assert!(!has_permission(required, granted, PermissionCheck::All));
        assert!(has_permission(required, granted, PermissionCheck::Any));
    }

    #[test]
    fn any_with_no_matching_bit() {
        let granted = Permissions::VIEW_ISSUES;
        let required = Permissions::MANAGE_REQUESTS | Permissions::MANAGE_USERS;
        assert!(!has_permission(required, granted, PermissionCheck::Any));
    }

    #[test]
    fn empty_requirement_never_matches_without_admin() {
        assert!(!has_permission(
            Permissions::empty(),
            Permissions::REQUEST,
            PermissionCheck::All
        ));
        assert!(has_permission(
            Permissions::empty(),
            Permissions::ADMIN,
            PermissionCheck::All
        ));
    }

    #[test]
    fn mixed_list_uses_implication_per_bit() {
        // MANAGE_REQUESTS covers the auto-approve half of the requirement but
        // not the unrelated settings bit.
        let granted = Permissions::MANAGE_REQUESTS;
        let required = Permissions::AUTO_APPROVE | Permissions::MANAGE_SETTINGS;
        assert!(!has_permission(required, granted, PermissionCheck::All));
        assert!(has_permission(required, granted, PermissionCheck::Any));
    }

    #[test]
    fn permission_bits_are_disjoint_powers_of_two() {
        let mut seen = 0u32;
        for flag in Permissions::all().iter() {
            let bits = flag.bits();
            assert_eq!(bits.count_ones(), 1, "{flag:?} is not a single bit");
            assert_eq!(seen & bits, 0, "{flag:?} overlaps another capability");
            seen |= bits;
        }
    }
}
