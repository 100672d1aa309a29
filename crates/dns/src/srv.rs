//! 존 워크에서 질의하는 잘 알려진 SRV 서비스 이름

/// 존 레벨 앞에 붙여 질의하는 서비스 레이블
pub const SRV_NAMES: &[&str] = &[
    "_afs3-kaserver._tcp",
    "_afs3-kaserver._udp",
    "_afs3-prserver._tcp",
    "_afs3-prserver._udp",
    "_afs3-vlserver._tcp",
    "_afs3-vlserver._udp",
    "_amt._udp",
    "_autodiscover._tcp",
    "_autotunnel._udp",
    "_avatars._tcp",
    "_avatars-sec._tcp",
    "_caldav._tcp",
    "_caldavs._tcp",
    "_carddav._tcp",
    "_carddavs._tcp",
    "_certificates._tcp",
    "_client._smtp",
    "_cmp._tcp",
    "_crl._tcp",
    "_crls._tcp",
    "_dns._udp",
    "_dns-llq._tcp",
    "_dns-llq._udp",
    "_dns-llq-tls._tcp",
    "_dns-push-tls._tcp",
    "_dns-sd._udp",
    "_dns-update._udp",
    "_dns-update-tls._tcp",
    "_domainkey._tcp",
    "_finger._tcp",
    "_fmpro._tcp",
    "_ftp._tcp",
    "_gc._tcp",
    "_h323be._tcp",
    "_h323be._udp",
    "_h323cs._tcp",
    "_h323cs._udp",
    "_h323ls._tcp",
    "_h323ls._udp",
    "_h323rs._tcp",
    "_hkp._tcp",
    "_hkps._tcp",
    "_http._tcp",
    "_https._tcp",
    "_iax._udp",
    "_imap._tcp",
    "_imaps._tcp",
    "_ipp._tcp",
    "_ipps._tcp",
    "_jabber._tcp",
    "_jabber-client._tcp",
    "_jabber-client._udp",
    "_kerberos._tcp",
    "_kerberos._udp",
    "_kerberos._tcp.dc._msdcs",
    "_kerberos-adm._tcp",
    "_kerberos-iv._udp",
    "_kerberos-master._tcp",
    "_kerberos-master._udp",
    "_kpasswd._tcp",
    "_kpasswd._udp",
    "_ldap._tcp",
    "_ldap._tcp.dc._msdcs",
    "_ldap._tcp.gc._msdcs",
    "_ldap._tcp.pdc._msdcs",
    "_ldap._tcp.forestdnszones",
    "_ldap._tcp.domaindnszones",
    "_ldaps._tcp",
    "_matrix._tcp",
    "_matrix-vnet._tcp",
    "_minecraft._tcp",
    "_mongodb._tcp",
    "_msrp._tcp",
    "_mtqp._tcp",
    "_mumble._tcp",
    "_nfs-domainroot._tcp",
    "_nicname._tcp",
    "_ntp._udp",
    "_ocsp._tcp",
    "_pgpkeys._tcp",
    "_pgprevokations._tcp",
    "_pop2._tcp",
    "_pop3._tcp",
    "_pop3s._tcp",
    "_presence._tcp",
    "_printer._tcp",
    "_puppet._tcp",
    "_radius._tcp",
    "_radius._udp",
    "_radiustls._tcp",
    "_radiustls._udp",
    "_radsec._tcp",
    "_rfb._tcp",
    "_rtps._tcp",
    "_rwhois._tcp",
    "_sieve._tcp",
    "_sip._sctp",
    "_sip._tcp",
    "_sip._tls",
    "_sip._udp",
    "_sipfederationtls._tcp",
    "_sipinternal._tcp",
    "_sipinternaltls._tcp",
    "_sips._sctp",
    "_sips._tcp",
    "_sips._udp",
    "_smb._tcp",
    "_smtp._tcp",
    "_smtp._tls",
    "_snmp._udp",
    "_soap-beep._tcp",
    "_ssh._tcp",
    "_stun._tcp",
    "_stun._udp",
    "_stuns._tcp",
    "_submission._tcp",
    "_submissions._tcp",
    "_svcp._tcp",
    "_telnet._tcp",
    "_test._tcp",
    "_tftp._udp",
    "_timezone._tcp",
    "_timezones._tcp",
    "_turn._tcp",
    "_turn._udp",
    "_turns._tcp",
    "_vlmcs._tcp",
    "_vlmcs._udp",
    "_whois._tcp",
    "_wpad._tcp",
    "_www._tcp",
    "_www-http._tcp",
    "_x-puppet._tcp",
    "_xcp._tcp",
    "_xmpp._tcp",
    "_xmpp-client._tcp",
    "_xmpp-client._udp",
    "_xmpp-server._tcp",
    "_xmpp-server._udp",
    "_xmpp-bosh._tcp",
    "_xmppconnect._tcp",
    "_collab-edge._tls",
    "_cisco-uds._tcp",
    "_cuplogin._tcp",
    "_citrixreceiver._tcp",
    "_lync._tcp",
    "_sipfederationtls._tls",
    "_elasticsearch._tcp",
    "_etcd-client._tcp",
    "_etcd-server._tcp",
    "_etcd-server-ssl._tcp",
    "_kubernetes._tcp",
    "_consul._tcp",
    "_mysql._tcp",
    "_postgresql._tcp",
    "_redis._tcp",
    "_vnc._tcp",
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_are_unique_service_labels() {
        let unique: HashSet<_> = SRV_NAMES.iter().collect();
        assert_eq!(unique.len(), SRV_NAMES.len());
        assert!(SRV_NAMES.len() >= 150);
        assert!(SRV_NAMES.iter().all(|n| n.starts_with('_') && n.contains('.')));
    }
}
