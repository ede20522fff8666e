//! Contract surface of the settlement contract and the stealth key registry.
//!
//! Only the functions and the event the protocol touches are declared.

#![allow(missing_docs)]

alloy::sol! {
    /// Emitted by the settlement contract for every payment.
    event Announcement(
        address indexed receiver,
        uint256 amount,
        address indexed token,
        bytes32 pkx,
        bytes32 ciphertext
    );

    /// Fixed surcharge per payment.
    function toll() external view returns (uint256);

    /// Token amount held by the contract for a stealth address.
    function tokenPayments(address stealth_address, address token) external view returns (uint256);

    function sendEth(address receiver, uint256 toll_commitment, bytes32 pkx, bytes32 ciphertext) external payable;

    function sendToken(address receiver, address token, uint256 amount, bytes32 pkx, bytes32 ciphertext) external payable;

    function withdrawToken(address acceptor, address token) external;

    function withdrawTokenOnBehalf(
        address stealth_address,
        address acceptor,
        address token,
        address sponsor,
        uint256 sponsor_fee,
        uint8 v,
        bytes32 r,
        bytes32 s
    ) external;

    function withdrawTokenAndCallOnBehalf(
        address stealth_address,
        address acceptor,
        address token,
        address sponsor,
        uint256 sponsor_fee,
        address hook,
        bytes data,
        uint8 v,
        bytes32 r,
        bytes32 s
    ) external;

    /// ERC-20 balance.
    function balanceOf(address owner) external view returns (uint256);

    /// Stealth key registry lookup.
    function stealthKeys(address registrant) external view returns (
        uint256 spending_prefix,
        uint256 spending_key,
        uint256 viewing_prefix,
        uint256 viewing_key
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{keccak256, Address, B256, U256};
    use alloy::sol_types::{SolCall, SolEvent};

    #[test]
    fn test_announcement_event_signature() {
        assert_eq!(
            Announcement::SIGNATURE_HASH,
            keccak256("Announcement(address,uint256,address,bytes32,bytes32)")
        );
    }

    #[test]
    fn test_send_eth_selector() {
        let expected = &keccak256("sendEth(address,uint256,bytes32,bytes32)")[..4];
        assert_eq!(sendEthCall::SELECTOR.as_slice(), expected);
    }

    #[test]
    fn test_call_roundtrip_through_selector() {
        let call = withdrawTokenCall {
            acceptor: Address::repeat_byte(0x11),
            token: Address::repeat_byte(0x22),
        };
        let encoded = call.abi_encode();
        let decoded = withdrawTokenCall::abi_decode(&encoded, true).unwrap();
        assert_eq!(decoded.acceptor, call.acceptor);
        assert_eq!(decoded.token, call.token);
    }

    #[test]
    fn test_event_log_layout() {
        let event = Announcement {
            receiver: Address::repeat_byte(0xAA),
            amount: U256::from(5u64),
            token: Address::repeat_byte(0xBB),
            pkx: B256::repeat_byte(0x01),
            ciphertext: B256::repeat_byte(0x02),
        };
        let log = event.encode_log_data();
        assert_eq!(log.topics().len(), 3);
        assert_eq!(log.data.len(), 96);

        let decoded = Announcement::decode_raw_log(log.topics().iter().copied(), &log.data, true).unwrap();
        assert_eq!(decoded.receiver, event.receiver);
        assert_eq!(decoded.pkx, event.pkx);
    }
}
