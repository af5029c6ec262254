//! Contract call bindings for the loan vault and its value token.

use alloy::sol;

sol! {
    /// Loan vault surface consumed by this subsystem.
    ///
    /// `getActiveLoan` returns an all-zero tuple when the borrower has no
    /// loan; the reader translates that into `None`.
    interface ILoanVault {
        function getActiveLoan(address borrower)
            external
            view
            returns (
                uint256 principal,
                uint256 maxPaymentDate,
                uint8 status,
                uint256 createdAt,
                bool isOverdue
            );

        function requestLoan(uint256 amount, uint256 maxPaymentDate) external;

        function payBackLoan(uint256 amount) external;

        function hasActiveLoanStatus(address borrower) external view returns (bool);

        function getContractBalance() external view returns (uint256);
    }

    /// ERC20 subset used for repayment funding.
    interface IValueToken {
        function balanceOf(address owner) external view returns (uint256);

        function allowance(address owner, address spender) external view returns (uint256);

        function approve(address spender, uint256 amount) external returns (bool);
    }
}
