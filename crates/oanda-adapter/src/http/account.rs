/*
[INPUT]:  Account identifier and bearer token
[OUTPUT]: Account data (account list, open positions, single position)
[POS]:    HTTP layer - account endpoints
[UPDATE]: When adding new account endpoints or changing query parameters
*/

use crate::http::{OandaClient, Result};
use crate::types::{AccountPosition, AccountPositions, Accounts};

impl OandaClient {
    /// List the accounts the token is authorized for
    ///
    /// GET /v3/accounts
    pub async fn get_accounts(&self) -> Result<Accounts> {
        let url = self.api_url("/v3/accounts");
        self.get_json(&url).await
    }

    /// Positions with open units on the account
    ///
    /// GET /v3/accounts/{account}/openPositions
    pub async fn get_open_positions(&self) -> Result<AccountPositions> {
        let url = self.account_url("/openPositions")?;
        self.get_json(&url).await
    }

    /// Position for a single instrument
    ///
    /// GET /v3/accounts/{account}/positions/{instrument}
    pub async fn get_position(&self, instrument: &str) -> Result<AccountPosition> {
        let instrument = Self::instrument_segment(instrument)?;
        let url = self.account_url(&format!("/positions/{instrument}"))?;
        self.get_json(&url).await
    }
}
