//! Municipal-portal dialect parser.
//!
//! Several city portals export service invoices as a flat, namespace-less
//! document rooted at `<NFe>`, with no relation to the national NF-e schema
//! beyond the root name. Tags sit directly under the root (`NumeroNFe`,
//! `ValorServicos`, ...) with `Prestador`/`Tomador` party blocks.

use roxmltree::Document;

use super::{NfseRecord, parse_decimal_br, parse_nfse_date, parse_withholding_flag};
use crate::xmlquery::{child, child_text, first_path_text};

pub(super) fn parse(doc: &Document) -> Option<NfseRecord> {
    let root = doc.root_element();
    let provider = child(root, "Prestador");
    let client = child(root, "Tomador");

    let mut record = NfseRecord {
        layout: Some("MUNICIPAL_NFE".to_string()),
        number: child_text(root, "NumeroNFe"),
        series: child_text(root, "SerieNFe"),
        verification_code: child_text(root, "CodigoVerificacao"),
        emission_date: child_text(root, "DataEmissaoNFe").and_then(|s| parse_nfse_date(&s)),
        service_value: child_text(root, "ValorServicos").and_then(|s| parse_decimal_br(&s)),
        tax_base: child_text(root, "ValorBase").and_then(|s| parse_decimal_br(&s)),
        tax_rate: child_text(root, "AliquotaServicos").and_then(|s| parse_decimal_br(&s)),
        tax_amount: child_text(root, "ValorISS").and_then(|s| parse_decimal_br(&s)),
        tax_withheld: child_text(root, "ISSRetido").map(|s| parse_withholding_flag(&s)),
        description: child_text(root, "Discriminacao"),
        ..NfseRecord::default()
    };

    if let Some(provider) = provider {
        record.provider_id = first_path_text(provider, &[&["CNPJ"], &["CPF"]]);
        record.provider_municipal_registration = child_text(provider, "InscricaoMunicipal");
        record.provider_name = child_text(provider, "RazaoSocial");
        record.provider_city_code = child_text(provider, "CodigoMunicipio");
        record.provider_state = child_text(provider, "UF");
    }

    if let Some(client) = client {
        record.client_id = first_path_text(client, &[&["CNPJ"], &["CPF"]]);
        record.client_name = child_text(client, "RazaoSocial");
        record.client_city_code = child_text(client, "CodigoMunicipio");
        record.client_state = child_text(client, "UF");
    }

    Some(record)
}
