// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use ethers::contract::abigen;

// Checkpoint ledger and single-block proof verifier deployed on Ethereum.
abigen!(
    NearCheckpointLedger,
    r#"[
        function getLatestCheckpoint() external view returns (uint256)
        function getEpochHashesByHeight(uint256 height) external view returns (bytes32, bytes32)
        function saveEpochHashesAndSetCheckpoint(bytes32 previousHash, bytes32 currentHash, uint256 height) external
        function verifyAndSaveProof(bytes journal, bytes seal) external
        function isProofedHash(bytes hash) external view returns (bool)
    ]"#,
);
