//! Pre-computed 8-byte discriminators for the coordinator program.
//!
//! Anchor prefixes every account, instruction and event payload with the
//! first 8 bytes of `sha256("<namespace>:<Name>")`. The values are embedded
//! here once; the tests below recompute them from their names.

pub type Discriminator = [u8; 8];

pub mod account {
    use super::Discriminator;

    /// `sha256("account:VrfConfiguration")[..8]` (legacy generation config).
    pub const VRF_CONFIGURATION: Discriminator = [232, 41, 155, 150, 127, 28, 32, 160];
    /// `sha256("account:CoordinatorConfig")[..8]` (subscription generation config).
    pub const COORDINATOR_CONFIG: Discriminator = [172, 64, 171, 72, 168, 230, 93, 208];
    pub const SUBSCRIPTION: Discriminator = [64, 7, 26, 135, 102, 132, 98, 33];
    pub const CONSUMER_REGISTRATION: Discriminator = [214, 111, 64, 176, 202, 160, 126, 150];
    /// Shared by both generations; the layout is selected by the client's generation.
    pub const RANDOMNESS_REQUEST: Discriminator = [244, 231, 228, 160, 148, 28, 17, 184];
    /// Light Protocol discriminator: `sha256("CompressedRandomnessRequest")[..8]`.
    pub const COMPRESSED_RANDOMNESS_REQUEST: Discriminator = [149, 31, 244, 154, 189, 164, 84, 79];
}

pub mod instruction {
    use super::Discriminator;

    pub const INITIALIZE: Discriminator = [175, 175, 109, 31, 13, 152, 155, 237];
    pub const UPDATE_CONFIG: Discriminator = [29, 158, 252, 191, 10, 83, 219, 99];
    pub const CREATE_SUBSCRIPTION: Discriminator = [65, 71, 10, 60, 249, 82, 197, 12];
    pub const FUND_SUBSCRIPTION: Discriminator = [224, 196, 55, 110, 8, 87, 188, 114];
    pub const ADD_CONSUMER: Discriminator = [236, 161, 142, 188, 40, 139, 108, 106];
    pub const REMOVE_CONSUMER: Discriminator = [250, 124, 24, 230, 168, 7, 248, 36];
    pub const CANCEL_SUBSCRIPTION: Discriminator = [60, 139, 189, 242, 191, 208, 143, 18];
    pub const REQUEST_RANDOMNESS: Discriminator = [213, 5, 173, 166, 37, 236, 31, 18];
    pub const REQUEST_RANDOMNESS_WITH_CALLBACK: Discriminator =
        [140, 11, 204, 125, 241, 255, 204, 233];
    pub const REQUEST_RANDOM_WORDS: Discriminator = [138, 218, 31, 64, 39, 225, 143, 208];
    pub const REQUEST_RANDOMNESS_COMPRESSED: Discriminator = [165, 191, 78, 118, 224, 244, 121, 83];
    pub const FULFILL_RANDOMNESS: Discriminator = [235, 105, 140, 46, 40, 88, 117, 2];
    /// Also the discriminator of the consumer's callback instruction.
    pub const FULFILL_RANDOM_WORDS: Discriminator = [241, 31, 92, 116, 42, 230, 221, 188];
    pub const FULFILL_RANDOMNESS_COMPRESSED: Discriminator = [69, 6, 198, 148, 3, 22, 28, 21];
    pub const CONSUME_RANDOMNESS: Discriminator = [190, 217, 49, 162, 99, 26, 73, 234];
    pub const CLOSE_REQUEST: Discriminator = [170, 46, 165, 120, 223, 102, 115, 2];
}

pub mod event {
    use super::Discriminator;

    pub const RANDOMNESS_REQUESTED: Discriminator = [10, 64, 183, 29, 104, 63, 90, 149];
    pub const RANDOM_WORDS_REQUESTED: Discriminator = [165, 151, 43, 146, 9, 131, 196, 201];
    pub const COMPRESSED_RANDOMNESS_REQUESTED: Discriminator =
        [142, 194, 161, 1, 31, 36, 113, 37];
    pub const RANDOMNESS_FULFILLED: Discriminator = [61, 67, 128, 142, 15, 77, 223, 252];
    pub const RANDOM_WORDS_FULFILLED: Discriminator = [29, 175, 249, 165, 74, 169, 85, 82];
}
