use chrono::NaiveDate;
use notafiscal::core::{ModelCode, Period};
use notafiscal::extract::parse_fields;
use notafiscal::nfse::{detect_and_parse, split_batch};
use rust_decimal_macros::dec;

const ABRASF_NS: &str = "http://www.abrasf.org.br/nfse.xsd";

fn abrasf_comp_nfse(ns: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<CompNfse xmlns="{ns}">
  <Nfse>
    <InfNfse>
      <Numero>123</Numero>
      <CodigoVerificacao>ABC-1</CodigoVerificacao>
      <DataEmissao>2025-06-03T10:20:30</DataEmissao>
      <Competencia>2025-06-01</Competencia>
      <Servico>
        <Valores>
          <ValorServicos>1.234,56</ValorServicos>
          <IssRetido>1</IssRetido>
        </Valores>
        <Discriminacao>Consultoria em sistemas</Discriminacao>
      </Servico>
      <ValoresNfse>
        <BaseCalculo>1234.56</BaseCalculo>
        <Aliquota>2,00</Aliquota>
        <ValorIss>24,69</ValorIss>
      </ValoresNfse>
      <PrestadorServico>
        <IdentificacaoPrestador>
          <CpfCnpj><Cnpj>11222333000181</Cnpj></CpfCnpj>
          <InscricaoMunicipal>12345</InscricaoMunicipal>
        </IdentificacaoPrestador>
        <RazaoSocial>Prestadora Ltda</RazaoSocial>
        <Endereco>
          <CodigoMunicipio>3550308</CodigoMunicipio>
          <Uf>SP</Uf>
        </Endereco>
      </PrestadorServico>
      <TomadorServico>
        <IdentificacaoTomador>
          <CpfCnpj><Cnpj>99888777000166</Cnpj></CpfCnpj>
        </IdentificacaoTomador>
        <RazaoSocial>Tomadora SA</RazaoSocial>
      </TomadorServico>
    </InfNfse>
  </Nfse>
</CompNfse>"#
    )
}

#[test]
fn abrasf_comp_nfse_full_record() {
    let record = detect_and_parse(&abrasf_comp_nfse(ABRASF_NS)).unwrap();

    assert_eq!(record.layout.as_deref(), Some("ABRASF"));
    assert_eq!(record.number.as_deref(), Some("123"));
    assert_eq!(record.verification_code.as_deref(), Some("ABC-1"));
    assert_eq!(record.emission_date, NaiveDate::from_ymd_opt(2025, 6, 3));
    assert_eq!(record.competence, NaiveDate::from_ymd_opt(2025, 6, 1));

    assert_eq!(record.provider_id.as_deref(), Some("11222333000181"));
    assert_eq!(
        record.provider_municipal_registration.as_deref(),
        Some("12345")
    );
    assert_eq!(record.provider_name.as_deref(), Some("Prestadora Ltda"));
    assert_eq!(record.provider_city_code.as_deref(), Some("3550308"));
    assert_eq!(record.provider_state.as_deref(), Some("SP"));
    assert_eq!(record.client_id.as_deref(), Some("99888777000166"));
    assert_eq!(record.client_name.as_deref(), Some("Tomadora SA"));

    // comma and dot decimal conventions side by side
    assert_eq!(record.service_value, Some(dec!(1234.56)));
    assert_eq!(record.tax_base, Some(dec!(1234.56)));
    assert_eq!(record.tax_rate, Some(dec!(2.00)));
    assert_eq!(record.tax_amount, Some(dec!(24.69)));
    assert_eq!(record.tax_withheld, Some(true));
    assert_eq!(
        record.description.as_deref(),
        Some("Consultoria em sistemas")
    );
}

#[test]
fn comp_nfse_root_accepted_without_abrasf_namespace() {
    // a CompNfse root is ABRASF by shape even when the city serves it
    // under its own namespace
    let record = detect_and_parse(&abrasf_comp_nfse("urn:prefeitura:xyz")).unwrap();
    assert_eq!(record.layout.as_deref(), Some("ABRASF"));
    assert_eq!(record.number.as_deref(), Some("123"));
}

#[test]
fn multibyte_emission_date_degrades_to_none() {
    let xml = abrasf_comp_nfse(ABRASF_NS)
        .replace("2025-06-03T10:20:30", "éééééééééééé")
        .replace("<Competencia>2025-06-01</Competencia>", "");
    let record = detect_and_parse(&xml).unwrap();
    assert_eq!(record.number.as_deref(), Some("123"));
    assert_eq!(record.emission_date, None);
    assert_eq!(record.competence, None);
}

#[test]
fn soap_wrapped_response_is_parsed() {
    let xml = format!(
        r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <ConsultarNfseResposta xmlns="{ABRASF_NS}">
      <ListaNfse>
        {}
      </ListaNfse>
    </ConsultarNfseResposta>
  </soap:Body>
</soap:Envelope>"#,
        abrasf_comp_nfse(ABRASF_NS)
            .lines()
            .skip(1)
            .collect::<Vec<_>>()
            .join("\n")
    );
    let record = detect_and_parse(&xml).unwrap();
    assert_eq!(record.layout.as_deref(), Some("ABRASF"));
    assert_eq!(record.number.as_deref(), Some("123"));
    assert_eq!(record.provider_id.as_deref(), Some("11222333000181"));
}

#[test]
fn known_wrapper_name_accepted_without_namespace() {
    let xml = r#"<ListaNfse>
  <CompNfse><Nfse><InfNfse><Numero>7</Numero></InfNfse></Nfse></CompNfse>
</ListaNfse>"#;
    let record = detect_and_parse(xml).unwrap();
    assert_eq!(record.number.as_deref(), Some("7"));
}

#[test]
fn unknown_wrapper_without_abrasf_namespace_is_rejected() {
    let xml = r#"<RespostaQualquer>
  <InfNfse><Numero>7</Numero></InfNfse>
</RespostaQualquer>"#;
    assert!(detect_and_parse(xml).is_none());
}

const MUNICIPAL: &str = r#"<?xml version="1.0"?>
<NFe>
  <NumeroNFe>55</NumeroNFe>
  <SerieNFe>A</SerieNFe>
  <CodigoVerificacao>XYZ9</CodigoVerificacao>
  <DataEmissaoNFe>2025-12-16T00:00:00</DataEmissaoNFe>
  <Prestador>
    <CNPJ>11222333000181</CNPJ>
    <RazaoSocial>Oficina Web ME</RazaoSocial>
    <InscricaoMunicipal>99887</InscricaoMunicipal>
  </Prestador>
  <Tomador>
    <CPF>52998224725</CPF>
    <RazaoSocial>Fulano de Tal</RazaoSocial>
  </Tomador>
  <ValorServicos>1500,00</ValorServicos>
  <ValorBase>1500,00</ValorBase>
  <AliquotaServicos>0,05</AliquotaServicos>
  <ValorISS>75,00</ValorISS>
  <ISSRetido>N</ISSRetido>
  <Discriminacao>Desenvolvimento de site</Discriminacao>
</NFe>"#;

#[test]
fn municipal_nfe_rooted_variant() {
    let record = detect_and_parse(MUNICIPAL).unwrap();

    assert_eq!(record.layout.as_deref(), Some("MUNICIPAL_NFE"));
    assert_eq!(record.number.as_deref(), Some("55"));
    assert_eq!(record.series.as_deref(), Some("A"));
    assert_eq!(record.verification_code.as_deref(), Some("XYZ9"));
    assert_eq!(record.emission_date, NaiveDate::from_ymd_opt(2025, 12, 16));
    assert_eq!(record.provider_id.as_deref(), Some("11222333000181"));
    assert_eq!(record.client_id.as_deref(), Some("52998224725"));
    assert_eq!(record.service_value, Some(dec!(1500.00)));
    assert_eq!(record.tax_rate, Some(dec!(0.05)));
    assert_eq!(record.tax_amount, Some(dec!(75.00)));
    assert_eq!(record.tax_withheld, Some(false));
}

#[test]
fn genuine_nfe_is_not_treated_as_nfse() {
    // rooted at <NFe> but carrying infNFe: the national schema, not the
    // municipal service-invoice variant
    let xml = r#"<NFe><infNFe Id="NFe1"><ide><mod>55</mod></ide></infNFe></NFe>"#;
    assert!(detect_and_parse(xml).is_none());
    assert!(detect_and_parse("<nfeProc><NFe><infNFe/></NFe></nfeProc>").is_none());
}

#[test]
fn nfse_classifies_through_parse_fields() {
    let fields = parse_fields(abrasf_comp_nfse(ABRASF_NS).as_bytes());

    assert_eq!(fields.model, Some(ModelCode::Nfse));
    assert_eq!(fields.issuer.as_deref(), Some("11222333000181"));
    assert_eq!(fields.recipient.as_deref(), Some("99888777000166"));
    // synthetic key: no 44-digit access key exists for service invoices
    assert_eq!(
        fields.key.as_deref(),
        Some("NFSE|11222333000181|123|ABC-1")
    );
    // competence preferred over emission for the period
    assert_eq!(fields.period, Some(Period::new(2025, 6)));
}

#[test]
fn split_and_rezip_batch() {
    let batch = format!(
        r#"<ConsultarNfseResposta xmlns="{ABRASF_NS}">
  <ListaNfse>
    <CompNfse><Nfse><InfNfse><Numero>201</Numero></InfNfse></Nfse></CompNfse>
    <CompNfse><Nfse><InfNfse><Numero>202</Numero></InfNfse></Nfse></CompNfse>
    <CompNfse><Nfse><InfNfse><Numero>203</Numero></InfNfse></Nfse></CompNfse>
  </ListaNfse>
</ConsultarNfseResposta>"#
    );
    let parts = split_batch(batch.as_bytes(), "nfse_").unwrap();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0].0, "nfse_201.xml");
    assert_eq!(parts[2].0, "nfse_203.xml");

    // every part must classify standalone
    for (_, bytes) in &parts {
        let fields = parse_fields(bytes);
        assert_eq!(fields.model, Some(ModelCode::Nfse));
    }

    // round through the zip packer the way the batch workflow does
    let zipped = notafiscal::archive::zip_files(&parts).unwrap();
    assert!(!zipped.is_empty());
}
