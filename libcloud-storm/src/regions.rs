/// Every location from `az account list-locations`.
pub const AZURE_REGIONS: &[&str] = &[
    "eastasia",
    "southeastasia",
    "centralus",
    "eastus",
    "eastus2",
    "westus",
    "northcentralus",
    "southcentralus",
    "northeurope",
    "westeurope",
    "japanwest",
    "japaneast",
    "brazilsouth",
    "australiaeast",
    "australiasoutheast",
    "southindia",
    "centralindia",
    "westindia",
    "canadacentral",
    "canadaeast",
    "uksouth",
    "ukwest",
    "westcentralus",
    "westus2",
    "koreacentral",
    "koreasouth",
    "francecentral",
    "francesouth",
    "australiacentral",
    "australiacentral2",
    "southafricanorth",
    "southafricawest",
];

pub const DEFAULT_AZURE_REGIONS: &[&str] = &["eastus"];

/// Every region from `gcloud functions regions list`.
pub const GCP_REGIONS: &[&str] = &[
    "us-central1",
    "us-east1",
    "us-east4",
    "us-west2",
    "us-west3",
    "us-west4",
    "europe-west1",
    "europe-west2",
    "europe-west3",
    "europe-west6",
    "asia-east2",
    "asia-northeast1",
    "asia-northeast2",
    "asia-northeast3",
    "asia-south1",
    "asia-southeast2",
    "northamerica-northeast1",
    "southamerica-east1",
    "australia-southeast1",
];

pub const DEFAULT_GCP_REGIONS: &[&str] = &["us-central1"];
