use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use x402_types::facilitator::Facilitator;
use x402_types::proto::{
    PaymentPayload, PaymentRequired, SettleRequest, SettleResponse, SupportedPaymentKind,
    SupportedResponse, VerifyRequest, VerifyResponse,
};

pub const BASE_SEPOLIA: &str = "eip155:84532";
pub const BASE_SEPOLIA_USDC: &str = "0x036CbD53842c5426634e7929541eC2318f3dCF7e";
pub const SOLANA_DEVNET: &str = "solana:EtWTRABZaYq6iMfeYKouRu166VU2xqa1";
pub const SOLANA_DEVNET_USDC: &str = "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU";
pub const EVM_PAY_TO: &str = "0x209693Bc6afc0C5328bA36FaF03C514EF312287C";
pub const EVM_PAYER: &str = "0x857b06519E91e3A54538791bDbb0E22373e36b66";
pub const FEE_PAYER: &str = "2wKupLR9q6wXYppw8Gr2NvWxKBUqm4PPJKkQfoxHDBg4";

/// In-memory facilitator with canned answers and call recording.
#[derive(Clone)]
pub struct FakeFacilitator {
    pub supported: SupportedResponse,
    pub verify: VerifyResponse,
    pub settle: SettleResponse,
    pub unavailable: bool,
    pub verify_requests: Arc<Mutex<Vec<VerifyRequest>>>,
    pub settle_calls: Arc<AtomicUsize>,
}

impl FakeFacilitator {
    pub fn new() -> Self {
        let kinds = vec![
            SupportedPaymentKind {
                x402_version: 2,
                scheme: "exact".into(),
                network: BASE_SEPOLIA.into(),
                extra: None,
            },
            SupportedPaymentKind {
                x402_version: 2,
                scheme: "exact".into(),
                network: SOLANA_DEVNET.into(),
                extra: Some(json!({"feePayer": FEE_PAYER})),
            },
        ];
        Self {
            supported: SupportedResponse {
                kinds,
                extensions: vec![],
                signers: HashMap::new(),
            },
            verify: VerifyResponse::valid(EVM_PAYER),
            settle: SettleResponse::Success {
                payer: EVM_PAYER.into(),
                transaction: "0xfeedface".into(),
                network: BASE_SEPOLIA.into(),
            },
            unavailable: false,
            verify_requests: Arc::new(Mutex::new(Vec::new())),
            settle_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn rejecting(reason: &str) -> Self {
        Self {
            verify: VerifyResponse::invalid(None, reason),
            ..Self::new()
        }
    }

    pub fn settle_count(&self) -> usize {
        self.settle_calls.load(Ordering::SeqCst)
    }

    pub fn verify_count(&self) -> usize {
        self.verify_requests.lock().unwrap().len()
    }
}

impl Facilitator for FakeFacilitator {
    type Error = String;

    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, Self::Error> {
        self.verify_requests.lock().unwrap().push(request.clone());
        Ok(self.verify.clone())
    }

    async fn settle(&self, _request: &SettleRequest) -> Result<SettleResponse, Self::Error> {
        self.settle_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.settle.clone())
    }

    async fn supported(&self) -> Result<SupportedResponse, Self::Error> {
        if self.unavailable {
            Err("connection refused".to_string())
        } else {
            Ok(self.supported.clone())
        }
    }
}

/// What a buyer would send back after paying the first option of `required`.
pub fn pay_first_option(required: &PaymentRequired) -> String {
    let payload = PaymentPayload {
        x402_version: required.x402_version,
        resource: Some(required.resource.clone()),
        accepted: required.accepts[0].clone(),
        payload: json!({"signature": "0x00", "authorization": {}}),
    };
    payload.to_header().unwrap()
}
