//! ABRASF dialect parser.
//!
//! Works from the first `InfNfse` block found anywhere in the tree, so the
//! same code handles a bare `CompNfse`, a webservice response wrapper and
//! a SOAP envelope. Field locations vary between provider versions; each
//! logical field tries its candidate paths in priority order.

use roxmltree::Document;

use super::{NfseRecord, parse_decimal_br, parse_nfse_date, parse_withholding_flag};
use crate::xmlquery::{child_text, find_descendant, first_path_text, path_text};

pub(super) fn parse(doc: &Document) -> Option<NfseRecord> {
    let inf = find_descendant(doc.root_element(), "InfNfse")?;
    let provider = find_descendant(inf, "PrestadorServico");
    let client = find_descendant(inf, "TomadorServico");

    let mut record = NfseRecord {
        layout: Some("ABRASF".to_string()),
        number: child_text(inf, "Numero"),
        verification_code: child_text(inf, "CodigoVerificacao"),
        emission_date: child_text(inf, "DataEmissao").and_then(|s| parse_nfse_date(&s)),
        competence: path_text(inf, &["Competencia"]).and_then(|s| parse_nfse_date(&s)),
        description: first_path_text(inf, &[&["Servico", "Discriminacao"], &["Discriminacao"]]),
        ..NfseRecord::default()
    };

    if let Some(provider) = provider {
        record.provider_id = first_path_text(provider, &[&["Cnpj"], &["Cpf"]]);
        record.provider_municipal_registration = path_text(provider, &["InscricaoMunicipal"]);
        record.provider_name = path_text(provider, &["RazaoSocial"]);
        record.provider_city_code = first_path_text(
            provider,
            &[&["Endereco", "CodigoMunicipio"], &["CodigoMunicipio"]],
        );
        record.provider_state = first_path_text(provider, &[&["Endereco", "Uf"], &["Uf"]]);
    }

    if let Some(client) = client {
        record.client_id = first_path_text(client, &[&["Cnpj"], &["Cpf"]]);
        record.client_name = path_text(client, &["RazaoSocial"]);
        record.client_city_code = first_path_text(
            client,
            &[&["Endereco", "CodigoMunicipio"], &["CodigoMunicipio"]],
        );
        record.client_state = first_path_text(client, &[&["Endereco", "Uf"], &["Uf"]]);
    }

    record.service_value = first_path_text(
        inf,
        &[&["Servico", "Valores", "ValorServicos"], &["ValorServicos"]],
    )
    .and_then(|s| parse_decimal_br(&s));
    record.tax_base = first_path_text(
        inf,
        &[
            &["ValoresNfse", "BaseCalculo"],
            &["Valores", "BaseCalculo"],
            &["BaseCalculo"],
        ],
    )
    .and_then(|s| parse_decimal_br(&s));
    record.tax_rate = first_path_text(
        inf,
        &[
            &["ValoresNfse", "Aliquota"],
            &["Valores", "Aliquota"],
            &["Aliquota"],
        ],
    )
    .and_then(|s| parse_decimal_br(&s));
    record.tax_amount = first_path_text(
        inf,
        &[
            &["ValoresNfse", "ValorIss"],
            &["Valores", "ValorIss"],
            &["ValorIss"],
        ],
    )
    .and_then(|s| parse_decimal_br(&s));
    record.tax_withheld = first_path_text(
        inf,
        &[&["Servico", "Valores", "IssRetido"], &["IssRetido"]],
    )
    .map(|s| parse_withholding_flag(&s));

    Some(record)
}
