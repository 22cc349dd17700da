mod metadata_roundtrip;
