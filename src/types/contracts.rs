//! Solidity bindings for the gasless relayer contract and the tokens it moves.

use alloy::sol;
use serde::{Deserialize, Serialize};

sol! {
    /// A transfer authorized off-chain by `from`, as consumed by the relayer contract.
    #[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct TransferRequest {
        address from;
        address to;
        address token;
        uint256 amount;
        uint256 relayerFee;
        uint256 nonce;
        uint256 deadline;
    }

    /// ERC-2612 permit parameters forwarded to the token by the relayer contract.
    #[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct PermitData {
        uint256 value;
        uint256 deadline;
        uint8 v;
        bytes32 r;
        bytes32 s;
    }

    #[sol(rpc)]
    #[derive(Debug)]
    interface IGaslessRelayer {
        /// Emitted once a transfer and its fee have been moved.
        event GaslessTransferExecuted(
            address indexed from,
            address indexed to,
            address indexed token,
            uint256 amount,
            uint256 relayerFee,
            uint256 nonce
        );

        /// The recovered signer does not match `from`.
        error InvalidSignature();

        /// The request nonce is not the current nonce of `from`.
        error InvalidNonce();

        /// The request deadline has passed.
        error DeadlineExpired();

        /// `from` does not hold enough tokens.
        error InsufficientBalance();

        /// `from` has not approved the relayer contract for enough tokens.
        error InsufficientAllowance();

        /// The token does not implement ERC-2612.
        error PermitNotSupported();

        /// The relayer fee exceeds the maximum allowed by the contract.
        error FeeExceedsMaximum();

        /// The caller is not an authorized relayer.
        error UnauthorizedRelayer();

        /// Returns the nonce the next request of `user` must carry.
        function getCurrentUserNonce(address user) external view returns (uint256);

        /// Returns whether `token` implements ERC-2612 permits.
        function checkERC2612PermitSupport(address token) external view returns (bool);

        /// Transfers tokens that `request.from` has already approved to this contract.
        function processStandardGaslessTransfer(
            TransferRequest calldata request,
            bytes calldata signature
        ) external;

        /// Applies an ERC-2612 permit and transfers in the same call.
        function processPermitBasedGaslessTransfer(
            TransferRequest calldata request,
            bytes calldata signature,
            PermitData calldata permit
        ) external;

        /// Declared by the contract; not used by the relay.
        function processBatchStandardGaslessTransfers(
            TransferRequest[] calldata requests,
            bytes[] calldata signatures
        ) external;
    }

    #[sol(rpc)]
    #[derive(Debug)]
    interface IERC20 {
        event Transfer(address indexed from, address indexed to, uint256 amount);

        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function decimals() external view returns (uint8);
    }

    /// Standard ERC-20 custom errors (ERC-6093).
    #[derive(Debug)]
    interface IERC20Errors {
        error ERC20InsufficientBalance(address sender, uint256 balance, uint256 needed);
        error ERC20InsufficientAllowance(address spender, uint256 allowance, uint256 needed);
        error ERC2612ExpiredSignature(uint256 deadline);
        error ERC2612InvalidSigner(address signer, address owner);
    }
}
