//! Contract interfaces the builder encodes calls for.

use alloy::sol;

sol! {
    /// VeChain fungible token standard, call-compatible with ERC20.
    interface IVIP180 {
        function transfer(address to, uint256 amount) external returns (bool);
        function approve(address spender, uint256 amount) external returns (bool);
        function name() external view returns (string);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
    }

    #[derive(Debug, PartialEq, Eq)]
    struct Level {
        string name;
        bool isX;
        uint8 id;
        uint64 maturityBlocks;
        uint64 scaledRewardFactor;
        uint256 vetAmountRequiredToStake;
    }

    interface IStargateNFT {
        function getLevel(uint8 levelId) external view returns (Level memory);
        function stake(uint8 levelId) external payable returns (uint256 tokenId);
    }

    interface IColendPool {
        function supply(address asset, uint256 amount, address onBehalfOf, uint16 referralCode) external;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::{
        primitives::U256,
        sol_types::{SolCall, SolType},
    };

    #[test]
    fn test_selectors() {
        assert_eq!(hex::encode(IVIP180::transferCall::SELECTOR), "a9059cbb");
        assert_eq!(hex::encode(IVIP180::approveCall::SELECTOR), "095ea7b3");
        assert_eq!(hex::encode(IColendPool::supplyCall::SELECTOR), "617ba037");
        assert_eq!(hex::encode(IVIP180::nameCall::SELECTOR), "06fdde03");
        assert_eq!(hex::encode(IVIP180::symbolCall::SELECTOR), "95d89b41");
        assert_eq!(hex::encode(IVIP180::decimalsCall::SELECTOR), "313ce567");
        assert_eq!(IVIP180::decimalsCall {}.abi_encode().len(), 4);
    }

    #[test]
    fn test_level_decode() {
        let level = Level {
            name: "Strength".to_string(),
            isX: false,
            id: 1,
            maturityBlocks: 43_200,
            scaledRewardFactor: 150,
            vetAmountRequiredToStake: U256::from(600_000u64) * U256::from(10u64).pow(U256::from(18)),
        };
        let encoded = <Level as SolType>::abi_encode(&level);
        let decoded = <Level as SolType>::abi_decode(&encoded).unwrap();
        assert_eq!(decoded, level);

        let call = IStargateNFT::stakeCall { levelId: 1 }.abi_encode();
        assert_eq!(call.len(), 4 + 32);
        assert_eq!(call[35], 1);
    }
}
